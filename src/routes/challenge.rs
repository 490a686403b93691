use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::challenge::{
        ChallengeListResponse, ChallengeQuickStats, ChallengeSummary, CreateChallengeRequest,
        ListChallengesQuery, ResolveChallengeRequest, ResolveChallengeResponse,
        RespondChallengeRequest, SubmitNumberRequest,
    },
    error::AppError,
    routes::auth::Caller,
    services::{challenge_service, resolution_service},
    state::SharedState,
};

/// Routes handling the challenge lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/challenges", post(create_challenge))
        .route("/challenges/resolve", post(resolve_challenge))
        .route("/challenges/{id}", get(get_challenge))
        .route("/challenges/{id}/respond", post(respond_to_challenge))
        .route("/challenges/{id}/number", post(submit_number))
        .route("/challenges/user/{user_id}", get(list_user_challenges))
        .route("/challenges/stats/{user_id}", get(user_quick_stats))
}

/// Issue a new challenge to another user.
#[utoipa::path(
    post,
    path = "/challenges",
    tag = "challenges",
    request_body = CreateChallengeRequest,
    responses(
        (status = 201, description = "Challenge created", body = ChallengeSummary),
        (status = 400, description = "Invalid challenge data"),
        (status = 403, description = "Caller is not the declared initiator")
    )
)]
pub async fn create_challenge(
    State(state): State<SharedState>,
    caller: Caller,
    Valid(Json(payload)): Valid<Json<CreateChallengeRequest>>,
) -> Result<(StatusCode, Json<ChallengeSummary>), AppError> {
    let challenge = challenge_service::create_challenge(&state, &caller.uid, payload).await?;
    Ok((StatusCode::CREATED, Json(challenge.into())))
}

/// Fetch one challenge; participants only.
#[utoipa::path(
    get,
    path = "/challenges/{id}",
    tag = "challenges",
    params(("id" = String, Path, description = "Challenge identifier")),
    responses(
        (status = 200, description = "Challenge found", body = ChallengeSummary),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Challenge not found")
    )
)]
pub async fn get_challenge(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ChallengeSummary>, AppError> {
    let challenge = challenge_service::get_challenge(&state, &caller.uid, &id).await?;
    Ok(Json(challenge.into()))
}

/// Accept or reject a pending challenge; recipient only.
#[utoipa::path(
    post,
    path = "/challenges/{id}/respond",
    tag = "challenges",
    params(("id" = String, Path, description = "Challenge identifier")),
    request_body = RespondChallengeRequest,
    responses(
        (status = 200, description = "Challenge updated", body = ChallengeSummary),
        (status = 400, description = "Challenge is no longer pending or range invalid"),
        (status = 403, description = "Caller is not the recipient"),
        (status = 404, description = "Challenge not found")
    )
)]
pub async fn respond_to_challenge(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<RespondChallengeRequest>>,
) -> Result<Json<ChallengeSummary>, AppError> {
    let challenge =
        challenge_service::respond_to_challenge(&state, &caller.uid, &id, payload).await?;
    Ok(Json(challenge.into()))
}

/// Submit the caller's own number for an accepted challenge.
#[utoipa::path(
    post,
    path = "/challenges/{id}/number",
    tag = "challenges",
    params(("id" = String, Path, description = "Challenge identifier")),
    request_body = SubmitNumberRequest,
    responses(
        (status = 200, description = "Number recorded", body = ChallengeSummary),
        (status = 400, description = "Number outside the agreed range or already submitted"),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Challenge not found")
    )
)]
pub async fn submit_number(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitNumberRequest>>,
) -> Result<Json<ChallengeSummary>, AppError> {
    let challenge =
        challenge_service::submit_number(&state, &caller.uid, &id, payload.number).await?;
    Ok(Json(challenge.into()))
}

/// Resolve a challenge from both participants' numbers.
#[utoipa::path(
    post,
    path = "/challenges/resolve",
    tag = "challenges",
    request_body = ResolveChallengeRequest,
    responses(
        (status = 200, description = "Challenge resolved", body = ResolveChallengeResponse),
        (status = 400, description = "Numbers do not cover exactly the two participants"),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Challenge not found")
    )
)]
pub async fn resolve_challenge(
    State(state): State<SharedState>,
    caller: Caller,
    Valid(Json(payload)): Valid<Json<ResolveChallengeRequest>>,
) -> Result<Json<ResolveChallengeResponse>, AppError> {
    let outcome = resolution_service::resolve_challenge(&state, &caller.uid, payload).await?;
    Ok(Json(outcome))
}

/// Paginated listing of the caller's challenges.
#[utoipa::path(
    get,
    path = "/challenges/user/{user_id}",
    tag = "challenges",
    params(
        ("user_id" = String, Path, description = "Subject user"),
        ListChallengesQuery
    ),
    responses(
        (status = 200, description = "One page of challenges", body = ChallengeListResponse),
        (status = 403, description = "Caller is not the subject")
    )
)]
pub async fn list_user_challenges(
    State(state): State<SharedState>,
    caller: Caller,
    Path(user_id): Path<String>,
    Query(query): Query<ListChallengesQuery>,
) -> Result<Json<ChallengeListResponse>, AppError> {
    let page = challenge_service::list_challenges(&state, &caller.uid, &user_id, query).await?;
    Ok(Json(page))
}

/// Status tallies over the caller's created challenges.
#[utoipa::path(
    get,
    path = "/challenges/stats/{user_id}",
    tag = "challenges",
    params(("user_id" = String, Path, description = "Subject user")),
    responses(
        (status = 200, description = "Quick tallies", body = ChallengeQuickStats),
        (status = 403, description = "Caller is not the subject")
    )
)]
pub async fn user_quick_stats(
    State(state): State<SharedState>,
    caller: Caller,
    Path(user_id): Path<String>,
) -> Result<Json<ChallengeQuickStats>, AppError> {
    let stats = challenge_service::quick_stats(&state, &caller.uid, &user_id).await?;
    Ok(Json(stats))
}
