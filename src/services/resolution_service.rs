//! Resolution engine: final number comparison and challenge completion.
//!
//! Resolution is deliberately strict: the numbers map must cover exactly the
//! two participants, so a partial or spoofed submission can never corrupt the
//! statistics downstream.

use indexmap::IndexMap;
use time::OffsetDateTime;
use tracing::warn;

use crate::{
    dao::{
        challenge::ChallengeRepository,
        models::{ChallengeEntity, ChallengeResultEntity},
    },
    dto::{
        challenge::{ResolveChallengeRequest, ResolveChallengeResponse},
        format_timestamp,
        validation::NUMBER_MIN,
    },
    error::ServiceError,
    services::{
        challenge_service::{find_challenge, save_challenge},
        events, stats_service,
    },
    state::{
        SharedState,
        lifecycle::{LifecycleEvent, MatchOutcome, next_status},
    },
};

/// Resolve a challenge from an explicit two-entry numbers map.
pub async fn resolve_challenge(
    state: &SharedState,
    caller: &str,
    request: ResolveChallengeRequest,
) -> Result<ResolveChallengeResponse, ServiceError> {
    let repository = ChallengeRepository::new(state.require_store().await?);
    let challenge = find_challenge(&repository, &request.challenge_id).await?;

    if !challenge.is_participant(caller) {
        return Err(ServiceError::Forbidden(
            "access denied to this challenge".into(),
        ));
    }

    let (_, outcome) = finalize(state, &repository, challenge, request.numbers).await?;
    Ok(outcome)
}

/// Validate the numbers map against the challenge, persist the completion,
/// and fan out notifications plus best-effort statistics.
///
/// Shared by the resolve endpoint and the second-number submission path.
pub(crate) async fn finalize(
    state: &SharedState,
    repository: &ChallengeRepository,
    mut challenge: ChallengeEntity,
    numbers: IndexMap<String, i64>,
) -> Result<(ChallengeEntity, ResolveChallengeResponse), ServiceError> {
    if numbers.len() != 2 {
        return Err(ServiceError::InvalidInput(
            "numbers must be provided for both users".into(),
        ));
    }
    if !numbers.contains_key(&challenge.from_user) || !numbers.contains_key(&challenge.to_user) {
        return Err(ServiceError::InvalidInput(
            "numbers must be provided for both challenge participants".into(),
        ));
    }
    if numbers.values().any(|number| *number < NUMBER_MIN) {
        return Err(ServiceError::InvalidInput(
            "submitted numbers must be positive".into(),
        ));
    }

    let next = next_status(challenge.status, LifecycleEvent::Resolve)?;

    let from_number = numbers[&challenge.from_user];
    let to_number = numbers[&challenge.to_user];
    let result = if from_number == to_number {
        MatchOutcome::Match
    } else {
        MatchOutcome::NoMatch
    };

    // Normalize key order so stored documents always read initiator-first.
    let mut ordered = IndexMap::new();
    ordered.insert(challenge.from_user.clone(), from_number);
    ordered.insert(challenge.to_user.clone(), to_number);

    let now = OffsetDateTime::now_utc();
    challenge.status = next;
    challenge.numbers = Some(ordered.clone());
    challenge.result = Some(result);
    challenge.completed_at = Some(now);
    challenge.updated_at = now;
    challenge.submissions.clear();
    save_challenge(repository, &challenge).await?;

    let outcome = ResolveChallengeResponse {
        challenge_id: challenge.id.clone(),
        result,
        numbers: ordered,
        resolved_at: format_timestamp(now),
    };

    events::notify_challenge_resolved(state, &challenge, &outcome);

    // Aggregation is a best-effort follow-up: the completed challenge stands
    // even when it fails, and aggregates remain reconstructible from the
    // results history.
    let snapshot = build_result(&challenge, from_number, to_number, result, now);
    if let Err(err) = stats_service::record_challenge_result(state, &snapshot).await {
        warn!(
            challenge_id = %challenge.id,
            error = %err,
            "failed to record challenge result for statistics"
        );
    }

    Ok((challenge, outcome))
}

fn build_result(
    challenge: &ChallengeEntity,
    from_number: i64,
    to_number: i64,
    result: MatchOutcome,
    completed_at: OffsetDateTime,
) -> ChallengeResultEntity {
    let (range_min, range_max) = challenge
        .range
        .map(|range| (range.min, range.max))
        .unwrap_or((NUMBER_MIN, NUMBER_MIN));

    let accept_latency = challenge
        .accepted_at
        .map(|accepted| (accepted - challenge.created_at).as_seconds_f64().max(0.0))
        .map(std::time::Duration::from_secs_f64);
    let submit_latency = challenge
        .accepted_at
        .map(|accepted| (completed_at - accepted).as_seconds_f64().max(0.0))
        .map(std::time::Duration::from_secs_f64);

    ChallengeResultEntity {
        challenge_id: challenge.id.clone(),
        from_user: challenge.from_user.clone(),
        to_user: challenge.to_user.clone(),
        description: challenge.description.clone(),
        range_min,
        range_max,
        from_user_number: from_number,
        to_user_number: to_number,
        result,
        winner: match result {
            MatchOutcome::Match => Some(challenge.from_user.clone()),
            MatchOutcome::NoMatch => None,
        },
        created_at: challenge.created_at,
        completed_at,
        response_time_from_user: submit_latency,
        response_time_to_user: accept_latency,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::document_store::memory::MemoryStore,
        dto::{
            challenge::{CreateChallengeRequest, RespondChallengeRequest},
            common::RangeDto,
        },
        services::{challenge_service, stats_service},
        state::{AppState, lifecycle::ChallengeStatus},
    };

    async fn test_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(MemoryStore::new())).await;
        state
    }

    async fn accepted_challenge(state: &SharedState) -> ChallengeEntity {
        let challenge = challenge_service::create_challenge(
            state,
            "uid-alice",
            CreateChallengeRequest {
                description: "same number wins".into(),
                from_user: "uid-alice".into(),
                to_user: "uid-bob".into(),
            },
        )
        .await
        .unwrap();

        challenge_service::respond_to_challenge(
            state,
            "uid-bob",
            &challenge.id,
            RespondChallengeRequest {
                accepted: true,
                range: Some(RangeDto { min: 1, max: 10 }),
            },
        )
        .await
        .unwrap()
    }

    fn resolve_request(
        challenge_id: &str,
        entries: &[(&str, i64)],
    ) -> ResolveChallengeRequest {
        ResolveChallengeRequest {
            challenge_id: challenge_id.to_owned(),
            numbers: entries
                .iter()
                .map(|(user, number)| (user.to_string(), *number))
                .collect(),
        }
    }

    #[tokio::test]
    async fn equal_numbers_complete_with_a_match() {
        let state = test_state().await;
        let challenge = accepted_challenge(&state).await;

        let outcome = resolve_challenge(
            &state,
            "uid-alice",
            resolve_request(&challenge.id, &[("uid-alice", 5), ("uid-bob", 5)]),
        )
        .await
        .unwrap();

        assert_eq!(outcome.result, MatchOutcome::Match);
        assert_eq!(outcome.challenge_id, challenge.id);

        let stored = challenge_service::get_challenge(&state, "uid-alice", &challenge.id)
            .await
            .unwrap();
        assert_eq!(stored.status, ChallengeStatus::Completed);
        assert_eq!(stored.result, Some(MatchOutcome::Match));
        assert!(stored.completed_at.is_some());

        // The initiator is credited with the win.
        let alice = stats_service::get_user_stats(&state, "uid-alice", "uid-alice")
            .await
            .unwrap();
        assert_eq!(alice.matches_won, 1);
        assert_eq!(alice.matches_lost, 0);
        let bob = stats_service::get_user_stats(&state, "uid-bob", "uid-bob")
            .await
            .unwrap();
        assert_eq!(bob.matches_won, 0);
        assert_eq!(bob.matches_lost, 1);
    }

    #[tokio::test]
    async fn differing_numbers_complete_without_a_match() {
        let state = test_state().await;
        let challenge = accepted_challenge(&state).await;

        let outcome = resolve_challenge(
            &state,
            "uid-bob",
            resolve_request(&challenge.id, &[("uid-alice", 7), ("uid-bob", 8)]),
        )
        .await
        .unwrap();
        assert_eq!(outcome.result, MatchOutcome::NoMatch);

        let history = stats_service::get_challenge_history(&state, "uid-alice", "uid-alice", None)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result, MatchOutcome::NoMatch);
        assert!(history[0].winner.is_none());
    }

    #[tokio::test]
    async fn outcome_numbers_read_initiator_first() {
        let state = test_state().await;
        let challenge = accepted_challenge(&state).await;

        // Recipient listed first in the request; the outcome reorders.
        let outcome = resolve_challenge(
            &state,
            "uid-alice",
            resolve_request(&challenge.id, &[("uid-bob", 4), ("uid-alice", 9)]),
        )
        .await
        .unwrap();

        let (first_user, first_number) = outcome.numbers.get_index(0).unwrap();
        assert_eq!(first_user, "uid-alice");
        assert_eq!(*first_number, 9);
    }

    #[tokio::test]
    async fn partial_submissions_are_rejected_without_side_effects() {
        let state = test_state().await;
        let challenge = accepted_challenge(&state).await;

        let err = resolve_challenge(
            &state,
            "uid-alice",
            resolve_request(&challenge.id, &[("uid-alice", 3)]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        // The challenge stays where it was and no aggregates were touched.
        let stored = challenge_service::get_challenge(&state, "uid-alice", &challenge.id)
            .await
            .unwrap();
        assert_eq!(stored.status, ChallengeStatus::Accepted);
        assert!(matches!(
            stats_service::get_user_stats(&state, "uid-alice", "uid-alice")
                .await
                .unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn foreign_participants_are_rejected() {
        let state = test_state().await;
        let challenge = accepted_challenge(&state).await;

        let err = resolve_challenge(
            &state,
            "uid-alice",
            resolve_request(&challenge.id, &[("uid-alice", 3), ("uid-carol", 3)]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn only_participants_may_resolve() {
        let state = test_state().await;
        let challenge = accepted_challenge(&state).await;

        let err = resolve_challenge(
            &state,
            "uid-carol",
            resolve_request(&challenge.id, &[("uid-alice", 3), ("uid-bob", 3)]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = resolve_challenge(
            &state,
            "uid-alice",
            resolve_request("missing", &[("uid-alice", 3), ("uid-bob", 3)]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn resolution_requires_an_accepted_challenge() {
        let state = test_state().await;
        let pending = challenge_service::create_challenge(
            &state,
            "uid-alice",
            CreateChallengeRequest {
                description: "not accepted yet".into(),
                from_user: "uid-alice".into(),
                to_user: "uid-bob".into(),
            },
        )
        .await
        .unwrap();

        let err = resolve_challenge(
            &state,
            "uid-alice",
            resolve_request(&pending.id, &[("uid-alice", 3), ("uid-bob", 3)]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn completed_challenges_cannot_be_resolved_again() {
        let state = test_state().await;
        let challenge = accepted_challenge(&state).await;
        let request = resolve_request(&challenge.id, &[("uid-alice", 5), ("uid-bob", 5)]);

        resolve_challenge(&state, "uid-alice", resolve_request(
            &challenge.id,
            &[("uid-alice", 5), ("uid-bob", 5)],
        ))
        .await
        .unwrap();

        let err = resolve_challenge(&state, "uid-alice", request)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
