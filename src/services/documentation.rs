use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Mind Match Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::challenge::create_challenge,
        crate::routes::challenge::get_challenge,
        crate::routes::challenge::respond_to_challenge,
        crate::routes::challenge::submit_number,
        crate::routes::challenge::resolve_challenge,
        crate::routes::challenge::list_user_challenges,
        crate::routes::challenge::user_quick_stats,
        crate::routes::stats::user_stats,
        crate::routes::stats::global_stats,
        crate::routes::stats::number_stats,
        crate::routes::stats::top_numbers,
        crate::routes::stats::range_stats,
        crate::routes::stats::top_ranges,
        crate::routes::stats::user_history,
        crate::routes::stats::most_challenged,
        crate::routes::stats::most_active_pairs,
        crate::routes::stats::friends_activity,
        crate::routes::stats::challenge_recipients,
        crate::routes::stats::analytics_summary,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::common::RangeDto,
            crate::dto::challenge::CreateChallengeRequest,
            crate::dto::challenge::RespondChallengeRequest,
            crate::dto::challenge::SubmitNumberRequest,
            crate::dto::challenge::ResolveChallengeRequest,
            crate::dto::challenge::ResolveChallengeResponse,
            crate::dto::challenge::ChallengeSummary,
            crate::dto::challenge::ChallengeListResponse,
            crate::dto::challenge::ChallengeQuickStats,
            crate::dto::stats::UserStatsDto,
            crate::dto::stats::GlobalStatsDto,
            crate::dto::stats::NumberStatsDto,
            crate::dto::stats::RangeStatsDto,
            crate::dto::stats::PlayerInteractionDto,
            crate::dto::stats::PlayerPairDto,
            crate::dto::stats::ChallengeResultDto,
            crate::dto::stats::AnalyticsSummaryDto,
            crate::dto::ws::ClientInboundMessage,
            crate::dto::ws::EventEnvelope,
            crate::state::lifecycle::ChallengeStatus,
            crate::state::lifecycle::MatchOutcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "challenges", description = "Challenge lifecycle operations"),
        (name = "game-stats", description = "Statistics and analytics"),
        (name = "realtime", description = "WebSocket event stream"),
    )
)]
pub struct ApiDoc;
