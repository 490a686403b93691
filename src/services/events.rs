//! Typed realtime event fan-out.
//!
//! Core services call these helpers after a state change; delivery is
//! at-most-once and best-effort. The [`Notifier`] trait keeps the state
//! machine free of any transport detail.

use serde_json::json;

use crate::{
    dao::models::ChallengeEntity,
    dto::{
        challenge::{ChallengeSummary, ResolveChallengeResponse},
        ws::{EventEnvelope, NumberSubmittedEvent},
    },
    state::SharedState,
};

const EVENT_CHALLENGE_CREATED: &str = "challenge.created";
const EVENT_CHALLENGE_RESPONDED: &str = "challenge.responded";
const EVENT_NUMBER_SUBMITTED: &str = "challenge.number_submitted";
const EVENT_CHALLENGE_RESOLVED: &str = "challenge.resolved";

/// Capability to push an event to a set of users.
///
/// Implementations must never block and never fail the caller; a message to
/// a disconnected user is silently dropped.
pub trait Notifier: Send + Sync {
    /// Deliver `message` to every listed user currently reachable.
    fn notify(&self, user_ids: &[&str], message: &EventEnvelope);
}

/// Notifier that drops every event; used where fan-out is irrelevant.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _user_ids: &[&str], _message: &EventEnvelope) {}
}

/// Tell the recipient a challenge is waiting for them.
pub fn notify_challenge_created(state: &SharedState, challenge: &ChallengeEntity) {
    let summary: ChallengeSummary = challenge.clone().into();
    let message = EventEnvelope::new(EVENT_CHALLENGE_CREATED, summary);
    state.notifier().notify(&[&challenge.to_user], &message);
}

/// Tell both participants the recipient accepted or rejected.
pub fn notify_challenge_responded(state: &SharedState, challenge: &ChallengeEntity) {
    let summary: ChallengeSummary = challenge.clone().into();
    let message = EventEnvelope::new(EVENT_CHALLENGE_RESPONDED, summary);
    state
        .notifier()
        .notify(&[&challenge.from_user, &challenge.to_user], &message);
}

/// Tell the counterpart that a number arrived, without revealing it.
pub fn notify_number_submitted(state: &SharedState, challenge: &ChallengeEntity, submitter: &str) {
    let message = EventEnvelope::new(
        EVENT_NUMBER_SUBMITTED,
        NumberSubmittedEvent {
            challenge_id: challenge.id.clone(),
            submitted_by: submitter.to_owned(),
            status: challenge.status,
        },
    );
    state
        .notifier()
        .notify(&[challenge.counterpart(submitter)], &message);
}

/// Tell both participants the outcome.
pub fn notify_challenge_resolved(
    state: &SharedState,
    challenge: &ChallengeEntity,
    outcome: &ResolveChallengeResponse,
) {
    let message = EventEnvelope::new(EVENT_CHALLENGE_RESOLVED, json!(outcome));
    state
        .notifier()
        .notify(&[&challenge.from_user, &challenge.to_user], &message);
}
