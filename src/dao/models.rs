//! Persisted entity definitions shared between repositories and services.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSecondsWithFrac, serde_as};
use time::OffsetDateTime;

use crate::state::lifecycle::{ChallengeStatus, MatchOutcome};

/// Inclusive number range agreed on when a challenge is accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NumberRange {
    /// Lower bound (≥ 1).
    pub min: i64,
    /// Upper bound (≤ 100, strictly greater than `min`).
    pub max: i64,
}

impl NumberRange {
    /// Whether a submitted number lies inside the range.
    pub fn contains(&self, number: i64) -> bool {
        (self.min..=self.max).contains(&number)
    }
}

/// The central challenge record, shared and mutated across its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeEntity {
    /// Store-generated identifier.
    pub id: String,
    /// What the challenge is about (1–500 characters).
    pub description: String,
    /// Initiating participant.
    pub from_user: String,
    /// Receiving participant, distinct from `from_user`.
    pub to_user: String,
    /// Current lifecycle state.
    pub status: ChallengeStatus,
    /// Agreed range, present once accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<NumberRange>,
    /// Mid-flight number submissions keyed by participant. At most one entry
    /// while the challenge is `active`; cleared into `numbers` on completion.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub submissions: IndexMap<String, i64>,
    /// Final numbers keyed by participant, present only once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numbers: Option<IndexMap<String, i64>>,
    /// Outcome, present only once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchOutcome>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last mutation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// When the recipient accepted, if they did.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub accepted_at: Option<OffsetDateTime>,
    /// When the challenge completed, if it did.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl ChallengeEntity {
    /// Whether the given user is one of the two participants.
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.from_user == user_id || self.to_user == user_id
    }

    /// The participant on the other side of `user_id`.
    pub fn counterpart(&self, user_id: &str) -> &str {
        if self.from_user == user_id {
            &self.to_user
        } else {
            &self.from_user
        }
    }
}

/// Immutable snapshot of a completed challenge, the aggregation input.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChallengeResultEntity {
    /// Challenge this result belongs to (also the document id).
    pub challenge_id: String,
    /// Initiating participant.
    pub from_user: String,
    /// Receiving participant.
    pub to_user: String,
    /// Challenge description at completion time.
    pub description: String,
    /// Agreed range lower bound.
    pub range_min: i64,
    /// Agreed range upper bound.
    pub range_max: i64,
    /// Number picked by the initiator.
    pub from_user_number: i64,
    /// Number picked by the recipient.
    pub to_user_number: i64,
    /// Match outcome.
    pub result: MatchOutcome,
    /// Participant credited with the win on a match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    /// When the challenge was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the challenge completed.
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
    /// Latency between acceptance and completion (initiator side).
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_from_user: Option<Duration>,
    /// Latency between creation and acceptance (recipient side).
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_to_user: Option<Duration>,
}

impl ChallengeResultEntity {
    /// Response latency attributable to one participant, by role.
    pub fn response_time_for(&self, is_creator: bool) -> Option<Duration> {
        if is_creator {
            self.response_time_from_user
        } else {
            self.response_time_to_user
        }
    }
}

/// One participant's number pick from a completed challenge, kept for
/// per-number analytics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NumberSelectionEntity {
    /// Participant who picked the number.
    pub user_id: String,
    /// The picked number.
    pub number: i64,
    /// Completion timestamp of the owning challenge.
    #[serde(with = "time::serde::rfc3339")]
    pub selected_at: OffsetDateTime,
    /// Owning challenge.
    pub challenge_id: String,
    /// Agreed range lower bound.
    pub range_min: i64,
    /// Agreed range upper bound.
    pub range_max: i64,
}

/// Per-user running counters, updated on every challenge completion.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStatsEntity {
    /// Owner of the counters.
    pub user_id: String,
    /// Challenges the user participated in.
    pub total_challenges: u64,
    /// Challenges the user initiated.
    pub challenges_created: u64,
    /// Challenges the user received.
    pub challenges_received: u64,
    /// Matches credited as wins.
    pub matches_won: u64,
    /// Matches credited as losses.
    pub matches_lost: u64,
    /// `matches_won / (matches_won + matches_lost)`, 0 before any match.
    pub win_rate: f64,
    /// Running mean of the user's response latencies.
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_response_time: Option<Duration>,
    /// Fastest response latency observed.
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastest_response_time: Option<Duration>,
    /// Most frequently picked number. Never computed incrementally; kept so
    /// a future batch pass can fill it without a schema change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_number: Option<i64>,
    /// Most used range lower bound (same caveat as `favorite_number`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_range_min: Option<i64>,
    /// Most used range upper bound (same caveat as `favorite_number`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_range_max: Option<i64>,
    /// Last time the user completed a challenge.
    #[serde(with = "time::serde::rfc3339")]
    pub last_active: OffsetDateTime,
    /// When the counters document was first created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last counters mutation.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserStatsEntity {
    /// Zeroed counters for a user seen for the first time.
    pub fn fresh(user_id: &str, now: OffsetDateTime) -> Self {
        Self {
            user_id: user_id.to_owned(),
            total_challenges: 0,
            challenges_created: 0,
            challenges_received: 0,
            matches_won: 0,
            matches_lost: 0,
            win_rate: 0.0,
            average_response_time: None,
            fastest_response_time: None,
            favorite_number: None,
            favorite_range_min: None,
            favorite_range_max: None,
            last_active: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Process-wide counters stored in the single `main` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalStatsEntity {
    /// Completed challenges ever recorded.
    pub total_challenges: u64,
    /// Completed challenges that ended in a match.
    pub total_matches: u64,
    /// `total_matches / total_challenges`.
    pub overall_success_rate: f64,
    /// Challenges whose creation falls after today's UTC midnight.
    pub challenges_today: u64,
    /// Challenges created since the UTC Monday week start.
    pub challenges_this_week: u64,
    /// Challenges created since the first of the UTC month.
    pub challenges_this_month: u64,
    /// Last aggregate mutation.
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl GlobalStatsEntity {
    /// Zeroed global counters.
    pub fn fresh(now: OffsetDateTime) -> Self {
        Self {
            total_challenges: 0,
            total_matches: 0,
            overall_success_rate: 0.0,
            challenges_today: 0,
            challenges_this_week: 0,
            challenges_this_month: 0,
            last_updated: now,
        }
    }
}

/// Usage counters for one number, keyed by its decimal string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumberStatsEntity {
    /// The number (1–100).
    pub number: i64,
    /// How many times it was picked, counting both participants separately.
    pub times_selected: u64,
    /// Placeholder: never recomputed from outcomes. A correct value needs a
    /// separate aggregation pass over `challenge_results`.
    pub success_rate: f64,
    /// Last time any participant picked it.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_selected: Option<OffsetDateTime>,
}

/// Usage counters for one declared range, keyed by `"{min}_{max}"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeStatsEntity {
    /// Range lower bound.
    pub range_min: i64,
    /// Range upper bound.
    pub range_max: i64,
    /// How many completed challenges used this range.
    pub times_used: u64,
    /// Placeholder, same caveat as [`NumberStatsEntity::success_rate`].
    pub success_rate: f64,
    /// Running mean of the fraction of submitted numbers inside the range.
    /// Upstream validation keeps every sample at 1.0, so the field carries no
    /// signal today; kept pending product clarification.
    pub average_numbers_in_range: f64,
}

impl RangeStatsEntity {
    /// Document key for a range.
    pub fn key(min: i64, max: i64) -> String {
        format!("{min}_{max}")
    }
}

/// Per-user interaction tallies across all counterparts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerInteractionEntity {
    /// Owner of the tallies.
    pub user_id: String,
    /// Completed challenges the user initiated.
    pub challenges_sent: u64,
    /// Completed challenges the user received.
    pub challenges_received: u64,
    /// `challenges_sent + challenges_received`.
    pub total_interactions: u64,
    /// Completion timestamp of the latest interaction.
    #[serde(with = "time::serde::rfc3339")]
    pub last_interaction: OffsetDateTime,
}

/// Symmetric interaction record between exactly two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerPairEntity {
    /// Lexicographically smaller participant id.
    pub user_a: String,
    /// Lexicographically larger participant id.
    pub user_b: String,
    /// Completed challenges between the two.
    pub total_challenges: u64,
    /// Challenges initiated by `user_a`.
    pub challenges_from_a: u64,
    /// Challenges initiated by `user_b`.
    pub challenges_from_b: u64,
    /// Matches between the two.
    pub matches: u64,
    /// `matches / total_challenges`.
    pub success_rate: f64,
    /// Completion timestamp of the latest challenge between the two.
    #[serde(with = "time::serde::rfc3339")]
    pub last_challenge: OffsetDateTime,
}

impl PlayerPairEntity {
    /// Sort two participant ids into the canonical `(user_a, user_b)` order.
    pub fn ordered<'a>(left: &'a str, right: &'a str) -> (&'a str, &'a str) {
        if left <= right { (left, right) } else { (right, left) }
    }

    /// Document key shared by both argument orders.
    pub fn key(left: &str, right: &str) -> String {
        let (a, b) = Self::ordered(left, right);
        format!("{a}_{b}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_containment_is_inclusive() {
        let range = NumberRange { min: 1, max: 10 };
        assert!(range.contains(1));
        assert!(range.contains(10));
        assert!(!range.contains(0));
        assert!(!range.contains(11));
    }

    #[test]
    fn pair_key_is_symmetric() {
        assert_eq!(
            PlayerPairEntity::key("uid-bob", "uid-alice"),
            PlayerPairEntity::key("uid-alice", "uid-bob"),
        );
        assert_eq!(
            PlayerPairEntity::key("uid-bob", "uid-alice"),
            "uid-alice_uid-bob"
        );
    }

    #[test]
    fn response_times_serialize_as_fractional_seconds() {
        let result = ChallengeResultEntity {
            challenge_id: "c1".into(),
            from_user: "a".into(),
            to_user: "b".into(),
            description: "guess".into(),
            range_min: 1,
            range_max: 10,
            from_user_number: 3,
            to_user_number: 3,
            result: MatchOutcome::Match,
            winner: Some("a".into()),
            created_at: time::macros::datetime!(2025-06-01 12:00 UTC),
            completed_at: time::macros::datetime!(2025-06-01 12:05 UTC),
            response_time_from_user: Some(Duration::from_millis(1500)),
            response_time_to_user: None,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["response_time_from_user"], 1.5);
        assert_eq!(json["result"], "match");
        assert!(json.get("response_time_to_user").is_none());
    }
}
