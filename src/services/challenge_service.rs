//! Challenge lifecycle operations: creation, response, number submission,
//! retrieval, and listings.

use futures::future::join_all;
use time::OffsetDateTime;

use crate::{
    dao::{
        challenge::ChallengeRepository,
        models::{ChallengeEntity, NumberRange},
    },
    dto::{
        challenge::{
            ChallengeListResponse, ChallengeQuickStats, ChallengeSummary, CreateChallengeRequest,
            ListChallengesQuery, RespondChallengeRequest,
        },
        validation::validate_range_bounds,
    },
    error::ServiceError,
    services::{events, identity, resolution_service},
    state::{
        SharedState,
        lifecycle::{ChallengeStatus, InvalidTransition, LifecycleEvent, MatchOutcome, next_status},
    },
};

const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_PAGE_SIZE: u32 = 100;

/// Issue a new challenge on behalf of the authenticated caller.
pub async fn create_challenge(
    state: &SharedState,
    caller: &str,
    request: CreateChallengeRequest,
) -> Result<ChallengeEntity, ServiceError> {
    if request.from_user != caller {
        return Err(ServiceError::Forbidden(
            "you can only create challenges for yourself".into(),
        ));
    }

    let description = request.description.trim();
    if description.is_empty() || description.len() > MAX_DESCRIPTION_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "description must be between 1 and {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    if request.from_user.trim().is_empty() || request.to_user.trim().is_empty() {
        return Err(ServiceError::InvalidInput("user id cannot be empty".into()));
    }
    if request.from_user == request.to_user {
        return Err(ServiceError::InvalidInput(
            "cannot create a challenge for yourself".into(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    let challenge = ChallengeEntity {
        id: String::new(),
        description: description.to_owned(),
        from_user: request.from_user,
        to_user: request.to_user,
        status: ChallengeStatus::Pending,
        range: None,
        submissions: Default::default(),
        numbers: None,
        result: None,
        created_at: now,
        updated_at: now,
        accepted_at: None,
        completed_at: None,
    };

    let repository = ChallengeRepository::new(state.require_store().await?);
    let challenge = repository.create(challenge).await?;

    events::notify_challenge_created(state, &challenge);
    Ok(challenge)
}

/// Accept or reject a pending challenge. Only the recipient may respond.
pub async fn respond_to_challenge(
    state: &SharedState,
    caller: &str,
    challenge_id: &str,
    request: RespondChallengeRequest,
) -> Result<ChallengeEntity, ServiceError> {
    let repository = ChallengeRepository::new(state.require_store().await?);
    let mut challenge = find_challenge(&repository, challenge_id).await?;

    if challenge.to_user != caller {
        return Err(ServiceError::Forbidden(
            "only the challenge recipient can respond".into(),
        ));
    }

    let event = if request.accepted {
        LifecycleEvent::Accept
    } else {
        LifecycleEvent::Reject
    };
    let next = next_status(challenge.status, event)?;

    let now = OffsetDateTime::now_utc();
    if request.accepted {
        let Some(range) = request.range else {
            return Err(ServiceError::InvalidInput(
                "accepting a challenge requires a number range".into(),
            ));
        };
        validate_range_bounds(range.min, range.max)
            .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

        challenge.range = Some(NumberRange::from(range));
        challenge.accepted_at = Some(now);
    }

    challenge.status = next;
    challenge.updated_at = now;
    save_challenge(&repository, &challenge).await?;

    events::notify_challenge_responded(state, &challenge);
    Ok(challenge)
}

/// Submit the caller's own number for an accepted challenge.
///
/// The first submission moves the challenge to `active`; the second combines
/// both picks and resolves it on the spot.
pub async fn submit_number(
    state: &SharedState,
    caller: &str,
    challenge_id: &str,
    number: i64,
) -> Result<ChallengeEntity, ServiceError> {
    let repository = ChallengeRepository::new(state.require_store().await?);
    let mut challenge = find_challenge(&repository, challenge_id).await?;

    if !challenge.is_participant(caller) {
        return Err(ServiceError::Forbidden(
            "access denied to this challenge".into(),
        ));
    }
    if !matches!(
        challenge.status,
        ChallengeStatus::Accepted | ChallengeStatus::Active
    ) {
        return Err(InvalidTransition {
            from: challenge.status,
            event: LifecycleEvent::SubmitFirstNumber,
        }
        .into());
    }

    let Some(range) = challenge.range else {
        return Err(ServiceError::InvalidState(
            "challenge has no agreed range".into(),
        ));
    };
    if !range.contains(number) {
        return Err(ServiceError::InvalidInput(format!(
            "number must lie within the agreed range {}-{}",
            range.min, range.max
        )));
    }
    if challenge.submissions.contains_key(caller) {
        return Err(ServiceError::InvalidState(
            "number already submitted for this challenge".into(),
        ));
    }

    challenge.submissions.insert(caller.to_owned(), number);

    if challenge.submissions.len() < 2 {
        challenge.status = next_status(challenge.status, LifecycleEvent::SubmitFirstNumber)?;
        challenge.updated_at = OffsetDateTime::now_utc();
        save_challenge(&repository, &challenge).await?;

        events::notify_number_submitted(state, &challenge, caller);
        return Ok(challenge);
    }

    // Both numbers are in: hand over to the resolution engine.
    let numbers = challenge.submissions.clone();
    let (challenge, _outcome) =
        resolution_service::finalize(state, &repository, challenge, numbers).await?;
    Ok(challenge)
}

/// Fetch one challenge; participants only.
pub async fn get_challenge(
    state: &SharedState,
    caller: &str,
    challenge_id: &str,
) -> Result<ChallengeEntity, ServiceError> {
    let repository = ChallengeRepository::new(state.require_store().await?);
    let challenge = find_challenge(&repository, challenge_id).await?;

    if !challenge.is_participant(caller) {
        return Err(ServiceError::Forbidden(
            "access denied to this challenge".into(),
        ));
    }
    Ok(challenge)
}

/// Paginated listing of a user's challenges, newest first, with display
/// names resolved best-effort.
pub async fn list_challenges(
    state: &SharedState,
    caller: &str,
    user_id: &str,
    query: ListChallengesQuery,
) -> Result<ChallengeListResponse, ServiceError> {
    if caller != user_id {
        return Err(ServiceError::Forbidden(
            "access denied to other users' challenges".into(),
        ));
    }

    let status_filter = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(ChallengeStatus::parse(raw).ok_or_else(|| {
            ServiceError::InvalidInput(format!("unknown status filter `{raw}`"))
        })?),
    };

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(state.config().default_page_size)
        .clamp(1, MAX_PAGE_SIZE);

    let repository = ChallengeRepository::new(state.require_store().await?);
    let mut challenges = repository.list_for_user(user_id).await?;

    if let Some(status) = status_filter {
        challenges.retain(|challenge| challenge.status == status);
    }
    challenges.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = challenges.len();
    let start = (page as usize - 1).saturating_mul(per_page as usize);
    let page_items: Vec<ChallengeEntity> = challenges
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    let summaries = join_all(page_items.into_iter().map(|challenge| async {
        let mut summary: ChallengeSummary = challenge.into();
        summary.from_user_display = Some(identity::display_name(state, &summary.from_user).await);
        summary.to_user_display = Some(identity::display_name(state, &summary.to_user).await);
        summary
    }))
    .await;

    Ok(ChallengeListResponse {
        challenges: summaries,
        total,
        page,
        per_page,
    })
}

/// Status tallies over the challenges a user created.
pub async fn quick_stats(
    state: &SharedState,
    caller: &str,
    user_id: &str,
) -> Result<ChallengeQuickStats, ServiceError> {
    if caller != user_id {
        return Err(ServiceError::Forbidden(
            "access denied to other users' statistics".into(),
        ));
    }

    let repository = ChallengeRepository::new(state.require_store().await?);
    let challenges = repository.created_by(user_id).await?;

    let count_status = |status: ChallengeStatus| {
        challenges
            .iter()
            .filter(|challenge| challenge.status == status)
            .count()
    };

    Ok(ChallengeQuickStats {
        total_challenges: challenges.len(),
        pending_challenges: count_status(ChallengeStatus::Pending),
        active_challenges: count_status(ChallengeStatus::Active),
        completed_challenges: count_status(ChallengeStatus::Completed),
        matches_won: challenges
            .iter()
            .filter(|challenge| challenge.result == Some(MatchOutcome::Match))
            .count(),
        matches_lost: challenges
            .iter()
            .filter(|challenge| challenge.result == Some(MatchOutcome::NoMatch))
            .count(),
    })
}

pub(crate) async fn find_challenge(
    repository: &ChallengeRepository,
    challenge_id: &str,
) -> Result<ChallengeEntity, ServiceError> {
    repository
        .find(challenge_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("challenge `{challenge_id}` not found")))
}

pub(crate) async fn save_challenge(
    repository: &ChallengeRepository,
    challenge: &ChallengeEntity,
) -> Result<(), ServiceError> {
    if !repository.save(challenge).await? {
        return Err(ServiceError::NotFound(format!(
            "challenge `{}` disappeared during update",
            challenge.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::document_store::memory::MemoryStore,
        dto::{common::RangeDto, ws::EventEnvelope},
        services::{events::Notifier, stats_service},
        state::{AppState, ClientHub},
    };

    /// Captures every event with its audience instead of pushing to sockets.
    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<(Vec<String>, String)>>,
    }

    impl RecordingNotifier {
        fn recorded(&self) -> Vec<(Vec<String>, String)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, user_ids: &[&str], message: &EventEnvelope) {
            self.events.lock().unwrap().push((
                user_ids.iter().map(|id| id.to_string()).collect(),
                message.event_type.clone(),
            ));
        }
    }

    async fn test_state() -> (SharedState, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::with_notifier(
            AppConfig::default(),
            Arc::new(ClientHub::new()),
            notifier.clone(),
        );
        state.install_store(Arc::new(MemoryStore::new())).await;
        (state, notifier)
    }

    fn create_request(from: &str, to: &str) -> CreateChallengeRequest {
        CreateChallengeRequest {
            description: "guess my number".into(),
            from_user: from.to_owned(),
            to_user: to.to_owned(),
        }
    }

    fn accept_request(min: i64, max: i64) -> RespondChallengeRequest {
        RespondChallengeRequest {
            accepted: true,
            range: Some(RangeDto { min, max }),
        }
    }

    async fn accepted_challenge(state: &SharedState) -> ChallengeEntity {
        let challenge =
            create_challenge(state, "uid-alice", create_request("uid-alice", "uid-bob"))
                .await
                .unwrap();
        respond_to_challenge(state, "uid-bob", &challenge.id, accept_request(1, 10))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn creation_starts_pending_and_notifies_the_recipient() {
        let (state, notifier) = test_state().await;

        let challenge =
            create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
                .await
                .unwrap();

        assert!(!challenge.id.is_empty());
        assert_eq!(challenge.status, ChallengeStatus::Pending);
        assert!(challenge.range.is_none());
        assert!(challenge.numbers.is_none());

        let events = notifier.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, vec!["uid-bob".to_owned()]);
        assert_eq!(events[0].1, "challenge.created");
    }

    #[tokio::test]
    async fn creation_rejects_bad_participants_and_descriptions() {
        let (state, _) = test_state().await;

        // Impersonation: the declared initiator must be the caller.
        let err = create_challenge(&state, "uid-bob", create_request("uid-alice", "uid-bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = create_challenge(
            &state,
            "uid-alice",
            create_request("uid-alice", "uid-alice"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let mut request = create_request("uid-alice", "uid-bob");
        request.description = "   ".into();
        let err = create_challenge(&state, "uid-alice", request)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let mut request = create_request("uid-alice", "uid-bob");
        request.description = "x".repeat(501);
        let err = create_challenge(&state, "uid-alice", request)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn only_the_recipient_may_respond() {
        let (state, _) = test_state().await;
        let challenge =
            create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
                .await
                .unwrap();

        for intruder in ["uid-alice", "uid-carol"] {
            let err = respond_to_challenge(&state, intruder, &challenge.id, accept_request(1, 10))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Forbidden(_)));
        }
    }

    #[tokio::test]
    async fn accepting_requires_a_well_formed_range() {
        let (state, _) = test_state().await;
        let challenge =
            create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
                .await
                .unwrap();

        let missing = RespondChallengeRequest {
            accepted: true,
            range: None,
        };
        let err = respond_to_challenge(&state, "uid-bob", &challenge.id, missing)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        // Degenerate range: min must be strictly below max.
        let err = respond_to_challenge(&state, "uid-bob", &challenge.id, accept_request(5, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        // Failed attempts must leave the challenge untouched.
        let current = get_challenge(&state, "uid-bob", &challenge.id).await.unwrap();
        assert_eq!(current.status, ChallengeStatus::Pending);
        assert!(current.range.is_none());
    }

    #[tokio::test]
    async fn accept_and_reject_transition_the_lifecycle() {
        let (state, notifier) = test_state().await;

        let accepted = accepted_challenge(&state).await;
        assert_eq!(accepted.status, ChallengeStatus::Accepted);
        assert_eq!(accepted.range, Some(NumberRange { min: 1, max: 10 }));
        assert!(accepted.accepted_at.is_some());

        // Terminal for the respond operation: a second response is illegal.
        let err = respond_to_challenge(&state, "uid-bob", &accepted.id, accept_request(1, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let challenge =
            create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
                .await
                .unwrap();
        let rejected = respond_to_challenge(
            &state,
            "uid-bob",
            &challenge.id,
            RespondChallengeRequest {
                accepted: false,
                range: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(rejected.status, ChallengeStatus::Rejected);

        let responded: Vec<_> = notifier
            .recorded()
            .into_iter()
            .filter(|(_, kind)| kind == "challenge.responded")
            .collect();
        assert_eq!(responded.len(), 2);
        assert_eq!(
            responded[0].0,
            vec!["uid-alice".to_owned(), "uid-bob".to_owned()]
        );
    }

    #[tokio::test]
    async fn first_submission_marks_the_challenge_active() {
        let (state, notifier) = test_state().await;
        let challenge = accepted_challenge(&state).await;

        let challenge = submit_number(&state, "uid-alice", &challenge.id, 5)
            .await
            .unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Active);
        assert_eq!(challenge.submissions.get("uid-alice"), Some(&5));
        assert!(challenge.numbers.is_none());
        assert!(challenge.result.is_none());

        // The counterpart hears a number arrived, never which one.
        let submitted: Vec<_> = notifier
            .recorded()
            .into_iter()
            .filter(|(_, kind)| kind == "challenge.number_submitted")
            .collect();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, vec!["uid-bob".to_owned()]);
    }

    #[tokio::test]
    async fn submissions_are_validated_against_range_and_role() {
        let (state, _) = test_state().await;
        let challenge = accepted_challenge(&state).await;

        let err = submit_number(&state, "uid-carol", &challenge.id, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = submit_number(&state, "uid-alice", &challenge.id, 11)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        submit_number(&state, "uid-alice", &challenge.id, 5)
            .await
            .unwrap();
        let err = submit_number(&state, "uid-alice", &challenge.id, 6)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn submitting_to_a_pending_challenge_is_illegal() {
        let (state, _) = test_state().await;
        let challenge =
            create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
                .await
                .unwrap();

        let err = submit_number(&state, "uid-alice", &challenge.id, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn second_submission_resolves_and_feeds_statistics() {
        let (state, _) = test_state().await;
        let challenge = accepted_challenge(&state).await;

        submit_number(&state, "uid-alice", &challenge.id, 7)
            .await
            .unwrap();
        let completed = submit_number(&state, "uid-bob", &challenge.id, 7)
            .await
            .unwrap();

        assert_eq!(completed.status, ChallengeStatus::Completed);
        assert_eq!(completed.result, Some(MatchOutcome::Match));
        assert!(completed.submissions.is_empty());
        let numbers = completed.numbers.unwrap();
        assert_eq!(numbers.get("uid-alice"), Some(&7));
        assert_eq!(numbers.get("uid-bob"), Some(&7));
        assert!(completed.completed_at.is_some());

        let alice = stats_service::get_user_stats(&state, "uid-alice", "uid-alice")
            .await
            .unwrap();
        assert_eq!(alice.total_challenges, 1);
        assert_eq!(alice.matches_won, 1);
        let bob = stats_service::get_user_stats(&state, "uid-bob", "uid-bob")
            .await
            .unwrap();
        assert_eq!(bob.matches_lost, 1);
    }

    #[tokio::test]
    async fn listing_pages_newest_first() {
        let (state, _) = test_state().await;

        let mut ids = Vec::new();
        for _ in 0..7 {
            let challenge =
                create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
                    .await
                    .unwrap();
            ids.push(challenge.id);
        }

        let page = list_challenges(
            &state,
            "uid-alice",
            "uid-alice",
            ListChallengesQuery {
                status: None,
                page: Some(2),
                per_page: Some(3),
            },
        )
        .await
        .unwrap();

        assert_eq!(page.total, 7);
        assert_eq!(page.page, 2);
        assert_eq!(page.per_page, 3);
        // Newest first: page 2 of 3 holds the 4th..6th most recent.
        let listed: Vec<&str> = page
            .challenges
            .iter()
            .map(|summary| summary.id.as_str())
            .collect();
        assert_eq!(listed, vec![&ids[3], &ids[2], &ids[1]]);
        assert!(page.challenges[0].from_user_display.is_some());
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_subject() {
        let (state, _) = test_state().await;

        let challenge =
            create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
                .await
                .unwrap();
        respond_to_challenge(&state, "uid-bob", &challenge.id, accept_request(1, 10))
            .await
            .unwrap();
        create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
            .await
            .unwrap();

        let accepted_only = list_challenges(
            &state,
            "uid-bob",
            "uid-bob",
            ListChallengesQuery {
                status: Some("accepted".into()),
                page: None,
                per_page: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(accepted_only.total, 1);
        assert_eq!(accepted_only.challenges[0].id, challenge.id);

        let err = list_challenges(
            &state,
            "uid-alice",
            "uid-alice",
            ListChallengesQuery {
                status: Some("archived".into()),
                page: None,
                per_page: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = list_challenges(
            &state,
            "uid-carol",
            "uid-alice",
            ListChallengesQuery {
                status: None,
                page: None,
                per_page: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn quick_stats_tally_created_challenges_by_status() {
        let (state, _) = test_state().await;

        // One pending, one rejected, one completed with a match.
        create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
            .await
            .unwrap();
        let challenge =
            create_challenge(&state, "uid-alice", create_request("uid-alice", "uid-bob"))
                .await
                .unwrap();
        respond_to_challenge(
            &state,
            "uid-bob",
            &challenge.id,
            RespondChallengeRequest {
                accepted: false,
                range: None,
            },
        )
        .await
        .unwrap();
        let challenge = accepted_challenge(&state).await;
        submit_number(&state, "uid-alice", &challenge.id, 3)
            .await
            .unwrap();
        submit_number(&state, "uid-bob", &challenge.id, 3)
            .await
            .unwrap();

        let stats = quick_stats(&state, "uid-alice", "uid-alice").await.unwrap();
        assert_eq!(stats.total_challenges, 3);
        assert_eq!(stats.pending_challenges, 1);
        assert_eq!(stats.active_challenges, 0);
        assert_eq!(stats.completed_challenges, 1);
        assert_eq!(stats.matches_won, 1);
        assert_eq!(stats.matches_lost, 0);
    }
}
