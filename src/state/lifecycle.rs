//! Pure challenge lifecycle rules.
//!
//! Every status change in the service layer funnels through
//! [`next_status`], so the legal transition table lives in exactly one place.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle states of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    /// Created, waiting for the recipient to accept or reject.
    Pending,
    /// Recipient accepted and fixed the number range.
    Accepted,
    /// Recipient declined. Terminal.
    Rejected,
    /// One participant has submitted a number, waiting for the other.
    Active,
    /// Both numbers are in and the outcome is recorded. Terminal.
    Completed,
}

impl ChallengeStatus {
    /// Parse the wire representation used in status query filters.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// Outcome of a completed challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Both participants picked the same number.
    Match,
    /// The numbers differed.
    NoMatch,
}

/// Events that can be applied to a challenge's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Recipient accepts the challenge.
    Accept,
    /// Recipient rejects the challenge.
    Reject,
    /// The first of the two numbers arrives.
    SubmitFirstNumber,
    /// Both numbers are present and the outcome is computed.
    Resolve,
}

/// Error returned when an event is not legal in the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event:?} cannot be applied while the challenge is {from:?}")]
pub struct InvalidTransition {
    /// Status the challenge was in when the event was received.
    pub from: ChallengeStatus,
    /// The offending event.
    pub event: LifecycleEvent,
}

/// Compute the next status for an event, or reject the transition.
pub fn next_status(
    from: ChallengeStatus,
    event: LifecycleEvent,
) -> Result<ChallengeStatus, InvalidTransition> {
    use ChallengeStatus::*;
    use LifecycleEvent::*;

    match (from, event) {
        (Pending, Accept) => Ok(Accepted),
        (Pending, Reject) => Ok(Rejected),
        (Accepted, SubmitFirstNumber) => Ok(Active),
        // A resolve call carrying both numbers may land before any
        // individual submission, straight out of the accepted state.
        (Accepted, Resolve) | (Active, Resolve) => Ok(Completed),
        (from, event) => Err(InvalidTransition { from, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_through_acceptance_and_resolution() {
        let status = next_status(ChallengeStatus::Pending, LifecycleEvent::Accept).unwrap();
        assert_eq!(status, ChallengeStatus::Accepted);

        let status = next_status(status, LifecycleEvent::SubmitFirstNumber).unwrap();
        assert_eq!(status, ChallengeStatus::Active);

        let status = next_status(status, LifecycleEvent::Resolve).unwrap();
        assert_eq!(status, ChallengeStatus::Completed);
    }

    #[test]
    fn resolve_is_legal_straight_from_accepted() {
        assert_eq!(
            next_status(ChallengeStatus::Accepted, LifecycleEvent::Resolve).unwrap(),
            ChallengeStatus::Completed
        );
    }

    #[test]
    fn rejection_is_terminal() {
        let status = next_status(ChallengeStatus::Pending, LifecycleEvent::Reject).unwrap();
        assert_eq!(status, ChallengeStatus::Rejected);

        for event in [
            LifecycleEvent::Accept,
            LifecycleEvent::Reject,
            LifecycleEvent::SubmitFirstNumber,
            LifecycleEvent::Resolve,
        ] {
            assert!(next_status(status, event).is_err());
        }
    }

    #[test]
    fn completed_is_terminal() {
        for event in [
            LifecycleEvent::Accept,
            LifecycleEvent::Reject,
            LifecycleEvent::SubmitFirstNumber,
            LifecycleEvent::Resolve,
        ] {
            assert!(next_status(ChallengeStatus::Completed, event).is_err());
        }
    }

    #[test]
    fn pending_rejects_resolution_events() {
        let err = next_status(ChallengeStatus::Pending, LifecycleEvent::Resolve).unwrap_err();
        assert_eq!(err.from, ChallengeStatus::Pending);
        assert_eq!(err.event, LifecycleEvent::Resolve);

        assert!(next_status(ChallengeStatus::Pending, LifecycleEvent::SubmitFirstNumber).is_err());
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in [
            ChallengeStatus::Pending,
            ChallengeStatus::Accepted,
            ChallengeStatus::Rejected,
            ChallengeStatus::Active,
            ChallengeStatus::Completed,
        ] {
            assert_eq!(ChallengeStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ChallengeStatus::parse("archived"), None);
    }
}
