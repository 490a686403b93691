use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    dao::models::{
        ChallengeResultEntity, GlobalStatsEntity, NumberStatsEntity, PlayerInteractionEntity,
        PlayerPairEntity, RangeStatsEntity, UserStatsEntity,
    },
    dto::{format_timestamp, format_timestamp_opt},
    state::lifecycle::MatchOutcome,
};

/// Per-user running counters as exposed over the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserStatsDto {
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
    /// Win rate in `[0, 1]`.
    pub win_rate: f64,
    /// Mean response latency in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response_time: Option<f64>,
    /// Fastest response latency in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest_response_time: Option<f64>,
    /// Most picked number, when a batch pass has filled it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_number: Option<i64>,
    /// Last activity timestamp.
    pub last_active: String,
    /// Counter document creation timestamp.
    pub created_at: String,
    /// Last counter mutation timestamp.
    pub updated_at: String,
}

impl From<UserStatsEntity> for UserStatsDto {
    fn from(entity: UserStatsEntity) -> Self {
        Self {
            user_id: entity.user_id,
            total_challenges: entity.total_challenges,
            challenges_created: entity.challenges_created,
            challenges_received: entity.challenges_received,
            matches_won: entity.matches_won,
            matches_lost: entity.matches_lost,
            win_rate: entity.win_rate,
            average_response_time: entity.average_response_time.map(|d| d.as_secs_f64()),
            fastest_response_time: entity.fastest_response_time.map(|d| d.as_secs_f64()),
            favorite_number: entity.favorite_number,
            last_active: format_timestamp(entity.last_active),
            created_at: format_timestamp(entity.created_at),
            updated_at: format_timestamp(entity.updated_at),
        }
    }
}

/// Global counters as exposed over the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct GlobalStatsDto {
    /// Completed challenges ever recorded.
    pub total_challenges: u64,
    /// Completed challenges that ended in a match.
    pub total_matches: u64,
    /// Overall match rate in `[0, 1]`.
    pub overall_success_rate: f64,
    /// Challenges created since UTC midnight.
    pub challenges_today: u64,
    /// Challenges created since the UTC Monday week start.
    pub challenges_this_week: u64,
    /// Challenges created since the first of the UTC month.
    pub challenges_this_month: u64,
    /// Last aggregate mutation timestamp.
    pub last_updated: String,
}

impl From<GlobalStatsEntity> for GlobalStatsDto {
    fn from(entity: GlobalStatsEntity) -> Self {
        Self {
            total_challenges: entity.total_challenges,
            total_matches: entity.total_matches,
            overall_success_rate: entity.overall_success_rate,
            challenges_today: entity.challenges_today,
            challenges_this_week: entity.challenges_this_week,
            challenges_this_month: entity.challenges_this_month,
            last_updated: format_timestamp(entity.last_updated),
        }
    }
}

/// Per-number counters as exposed over the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct NumberStatsDto {
    /// The number.
    pub number: i64,
    /// How many times it was picked.
    pub times_selected: u64,
    /// Stored success rate (see the aggregate's documentation).
    pub success_rate: f64,
    /// Last pick timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_selected: Option<String>,
}

impl From<NumberStatsEntity> for NumberStatsDto {
    fn from(entity: NumberStatsEntity) -> Self {
        Self {
            number: entity.number,
            times_selected: entity.times_selected,
            success_rate: entity.success_rate,
            last_selected: format_timestamp_opt(entity.last_selected),
        }
    }
}

/// Per-range counters as exposed over the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct RangeStatsDto {
    /// Range lower bound.
    pub range_min: i64,
    /// Range upper bound.
    pub range_max: i64,
    /// How many completed challenges used the range.
    pub times_used: u64,
    /// Stored success rate (see the aggregate's documentation).
    pub success_rate: f64,
    /// Running mean of submitted numbers inside the range.
    pub average_numbers_in_range: f64,
}

impl From<RangeStatsEntity> for RangeStatsDto {
    fn from(entity: RangeStatsEntity) -> Self {
        Self {
            range_min: entity.range_min,
            range_max: entity.range_max,
            times_used: entity.times_used,
            success_rate: entity.success_rate,
            average_numbers_in_range: entity.average_numbers_in_range,
        }
    }
}

/// Per-user interaction tallies as exposed over the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerInteractionDto {
    /// Owner of the tallies.
    pub user_id: String,
    /// Completed challenges the user initiated.
    pub challenges_sent: u64,
    /// Completed challenges the user received.
    pub challenges_received: u64,
    /// Sum of sent and received.
    pub total_interactions: u64,
    /// Latest interaction timestamp.
    pub last_interaction: String,
}

impl From<PlayerInteractionEntity> for PlayerInteractionDto {
    fn from(entity: PlayerInteractionEntity) -> Self {
        Self {
            user_id: entity.user_id,
            challenges_sent: entity.challenges_sent,
            challenges_received: entity.challenges_received,
            total_interactions: entity.total_interactions,
            last_interaction: format_timestamp(entity.last_interaction),
        }
    }
}

/// Symmetric pair record as exposed over the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerPairDto {
    /// Lexicographically smaller participant.
    pub user_a: String,
    /// Lexicographically larger participant.
    pub user_b: String,
    /// Completed challenges between the two.
    pub total_challenges: u64,
    /// Challenges initiated by `user_a`.
    pub challenges_from_a: u64,
    /// Challenges initiated by `user_b`.
    pub challenges_from_b: u64,
    /// Matches between the two.
    pub matches: u64,
    /// Match rate in `[0, 1]`.
    pub success_rate: f64,
    /// Latest challenge timestamp.
    pub last_challenge: String,
}

impl From<PlayerPairEntity> for PlayerPairDto {
    fn from(entity: PlayerPairEntity) -> Self {
        Self {
            user_a: entity.user_a,
            user_b: entity.user_b,
            total_challenges: entity.total_challenges,
            challenges_from_a: entity.challenges_from_a,
            challenges_from_b: entity.challenges_from_b,
            matches: entity.matches,
            success_rate: entity.success_rate,
            last_challenge: format_timestamp(entity.last_challenge),
        }
    }
}

/// Completed-challenge snapshot as exposed in history listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeResultDto {
    /// Owning challenge.
    pub challenge_id: String,
    /// Initiator uid.
    pub from_user: String,
    /// Recipient uid.
    pub to_user: String,
    /// Challenge description.
    pub description: String,
    /// Range lower bound.
    pub range_min: i64,
    /// Range upper bound.
    pub range_max: i64,
    /// Initiator's number.
    pub from_user_number: i64,
    /// Recipient's number.
    pub to_user_number: i64,
    /// Match outcome.
    pub result: MatchOutcome,
    /// Winner uid, when the outcome was a match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    /// Challenge creation timestamp.
    pub created_at: String,
    /// Challenge completion timestamp.
    pub completed_at: String,
}

impl From<ChallengeResultEntity> for ChallengeResultDto {
    fn from(entity: ChallengeResultEntity) -> Self {
        Self {
            challenge_id: entity.challenge_id,
            from_user: entity.from_user,
            to_user: entity.to_user,
            description: entity.description,
            range_min: entity.range_min,
            range_max: entity.range_max,
            from_user_number: entity.from_user_number,
            to_user_number: entity.to_user_number,
            result: entity.result,
            winner: entity.winner,
            created_at: format_timestamp(entity.created_at),
            completed_at: format_timestamp(entity.completed_at),
        }
    }
}

/// One-call overview combining global counters and leaderboards.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsSummaryDto {
    /// Global counters, absent before the first completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_stats: Option<GlobalStatsDto>,
    /// Most used numbers.
    pub top_numbers: Vec<NumberStatsDto>,
    /// Most used ranges.
    pub top_ranges: Vec<RangeStatsDto>,
    /// Most challenged players.
    pub most_challenged_players: Vec<PlayerInteractionDto>,
    /// Most active pairs.
    pub most_active_pairs: Vec<PlayerPairDto>,
    /// When the summary was computed (RFC 3339).
    pub timestamp: String,
}

/// Query parameters for leaderboard endpoints.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LimitQuery {
    /// Number of results to return (1–100).
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Query parameters for the top-numbers endpoint.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TopNumbersQuery {
    /// Number of results to return (1–100).
    #[serde(default)]
    pub limit: Option<u32>,
    /// Sort by usage (default) or by stored success rate.
    #[serde(default)]
    pub by_usage: Option<bool>,
}

/// Query parameters for history endpoints.
#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Number of results to return (1–200).
    #[serde(default)]
    pub limit: Option<u32>,
}
