use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    dto::stats::{
        AnalyticsSummaryDto, ChallengeResultDto, GlobalStatsDto, HistoryQuery, LimitQuery,
        NumberStatsDto, PlayerInteractionDto, PlayerPairDto, RangeStatsDto, TopNumbersQuery,
        UserStatsDto,
    },
    error::AppError,
    routes::auth::Caller,
    services::stats_service,
    state::SharedState,
};

/// Routes exposing the statistics read APIs.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game-stats/user/{user_id}", get(user_stats))
        .route("/game-stats/global", get(global_stats))
        .route("/game-stats/numbers/top", get(top_numbers))
        .route("/game-stats/numbers/{number}", get(number_stats))
        .route("/game-stats/ranges/top", get(top_ranges))
        .route("/game-stats/ranges/{min}/{max}", get(range_stats))
        .route("/game-stats/user/{user_id}/history", get(user_history))
        .route("/game-stats/social/most-challenged", get(most_challenged))
        .route(
            "/game-stats/social/most-active-pairs",
            get(most_active_pairs),
        )
        .route(
            "/game-stats/social/user/{user_id}/friends-activity",
            get(friends_activity),
        )
        .route(
            "/game-stats/social/user/{user_id}/challenge-recipients",
            get(challenge_recipients),
        )
        .route("/game-stats/analytics/summary", get(analytics_summary))
}

/// Running counters for one user; subject only.
#[utoipa::path(
    get,
    path = "/game-stats/user/{user_id}",
    tag = "game-stats",
    params(("user_id" = String, Path, description = "Subject user")),
    responses(
        (status = 200, description = "User statistics", body = UserStatsDto),
        (status = 403, description = "Caller is not the subject"),
        (status = 404, description = "No statistics recorded yet")
    )
)]
pub async fn user_stats(
    State(state): State<SharedState>,
    caller: Caller,
    Path(user_id): Path<String>,
) -> Result<Json<UserStatsDto>, AppError> {
    let stats = stats_service::get_user_stats(&state, &caller.uid, &user_id).await?;
    Ok(Json(stats.into()))
}

/// Global running counters.
#[utoipa::path(
    get,
    path = "/game-stats/global",
    tag = "game-stats",
    responses(
        (status = 200, description = "Global statistics", body = GlobalStatsDto),
        (status = 404, description = "No statistics recorded yet")
    )
)]
pub async fn global_stats(
    State(state): State<SharedState>,
) -> Result<Json<GlobalStatsDto>, AppError> {
    let stats = stats_service::get_global_stats(&state).await?;
    Ok(Json(stats.into()))
}

/// Counters for one number (1–100).
#[utoipa::path(
    get,
    path = "/game-stats/numbers/{number}",
    tag = "game-stats",
    params(("number" = i64, Path, description = "Number between 1 and 100")),
    responses(
        (status = 200, description = "Number statistics", body = NumberStatsDto),
        (status = 400, description = "Number outside 1-100"),
        (status = 404, description = "Number never selected")
    )
)]
pub async fn number_stats(
    State(state): State<SharedState>,
    Path(number): Path<i64>,
) -> Result<Json<NumberStatsDto>, AppError> {
    let stats = stats_service::get_number_stats(&state, number).await?;
    Ok(Json(stats.into()))
}

/// Most used numbers, by usage or stored success rate.
#[utoipa::path(
    get,
    path = "/game-stats/numbers/top",
    tag = "game-stats",
    params(TopNumbersQuery),
    responses((status = 200, description = "Top numbers", body = [NumberStatsDto]))
)]
pub async fn top_numbers(
    State(state): State<SharedState>,
    Query(query): Query<TopNumbersQuery>,
) -> Result<Json<Vec<NumberStatsDto>>, AppError> {
    let numbers =
        stats_service::get_top_numbers(&state, query.limit, query.by_usage.unwrap_or(true)).await?;
    Ok(Json(numbers.into_iter().map(Into::into).collect()))
}

/// Counters for one declared range.
#[utoipa::path(
    get,
    path = "/game-stats/ranges/{min}/{max}",
    tag = "game-stats",
    params(
        ("min" = i64, Path, description = "Range lower bound"),
        ("max" = i64, Path, description = "Range upper bound")
    ),
    responses(
        (status = 200, description = "Range statistics", body = RangeStatsDto),
        (status = 400, description = "Invalid range"),
        (status = 404, description = "Range never used")
    )
)]
pub async fn range_stats(
    State(state): State<SharedState>,
    Path((min, max)): Path<(i64, i64)>,
) -> Result<Json<RangeStatsDto>, AppError> {
    let stats = stats_service::get_range_stats(&state, min, max).await?;
    Ok(Json(stats.into()))
}

/// Most used ranges.
#[utoipa::path(
    get,
    path = "/game-stats/ranges/top",
    tag = "game-stats",
    params(LimitQuery),
    responses((status = 200, description = "Top ranges", body = [RangeStatsDto]))
)]
pub async fn top_ranges(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<RangeStatsDto>>, AppError> {
    let ranges = stats_service::get_top_ranges(&state, query.limit).await?;
    Ok(Json(ranges.into_iter().map(Into::into).collect()))
}

/// The caller's completed challenges, newest first.
#[utoipa::path(
    get,
    path = "/game-stats/user/{user_id}/history",
    tag = "game-stats",
    params(("user_id" = String, Path, description = "Subject user"), HistoryQuery),
    responses(
        (status = 200, description = "Completion history", body = [ChallengeResultDto]),
        (status = 403, description = "Caller is not the subject")
    )
)]
pub async fn user_history(
    State(state): State<SharedState>,
    caller: Caller,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChallengeResultDto>>, AppError> {
    let history =
        stats_service::get_challenge_history(&state, &caller.uid, &user_id, query.limit).await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

/// Users with the most recorded interactions.
#[utoipa::path(
    get,
    path = "/game-stats/social/most-challenged",
    tag = "game-stats",
    params(LimitQuery),
    responses((status = 200, description = "Most challenged players", body = [PlayerInteractionDto]))
)]
pub async fn most_challenged(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PlayerInteractionDto>>, AppError> {
    let players = stats_service::get_most_challenged_players(&state, query.limit).await?;
    Ok(Json(players.into_iter().map(Into::into).collect()))
}

/// Pairs with the most completed challenges between them.
#[utoipa::path(
    get,
    path = "/game-stats/social/most-active-pairs",
    tag = "game-stats",
    params(LimitQuery),
    responses((status = 200, description = "Most active pairs", body = [PlayerPairDto]))
)]
pub async fn most_active_pairs(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PlayerPairDto>>, AppError> {
    let pairs = stats_service::get_most_active_pairs(&state, query.limit).await?;
    Ok(Json(pairs.into_iter().map(Into::into).collect()))
}

/// Pair activity involving the caller, most active first.
#[utoipa::path(
    get,
    path = "/game-stats/social/user/{user_id}/friends-activity",
    tag = "game-stats",
    params(("user_id" = String, Path, description = "Subject user"), LimitQuery),
    responses(
        (status = 200, description = "Friends activity", body = [PlayerPairDto]),
        (status = 403, description = "Caller is not the subject")
    )
)]
pub async fn friends_activity(
    State(state): State<SharedState>,
    caller: Caller,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PlayerPairDto>>, AppError> {
    let pairs =
        stats_service::get_user_friends_activity(&state, &caller.uid, &user_id, query.limit)
            .await?;
    Ok(Json(pairs.into_iter().map(Into::into).collect()))
}

/// Recipients the caller challenges most often.
#[utoipa::path(
    get,
    path = "/game-stats/social/user/{user_id}/challenge-recipients",
    tag = "game-stats",
    params(("user_id" = String, Path, description = "Subject user"), LimitQuery),
    responses(
        (status = 200, description = "Challenge recipients", body = [PlayerInteractionDto]),
        (status = 403, description = "Caller is not the subject")
    )
)]
pub async fn challenge_recipients(
    State(state): State<SharedState>,
    caller: Caller,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PlayerInteractionDto>>, AppError> {
    let recipients =
        stats_service::get_user_challenge_recipients(&state, &caller.uid, &user_id, query.limit)
            .await?;
    Ok(Json(recipients.into_iter().map(Into::into).collect()))
}

/// Dashboard overview: global counters plus leaderboard heads.
#[utoipa::path(
    get,
    path = "/game-stats/analytics/summary",
    tag = "game-stats",
    responses((status = 200, description = "Analytics summary", body = AnalyticsSummaryDto))
)]
pub async fn analytics_summary(
    State(state): State<SharedState>,
) -> Result<Json<AnalyticsSummaryDto>, AppError> {
    let summary = stats_service::get_analytics_summary(&state).await?;
    Ok(Json(summary))
}
