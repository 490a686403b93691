//! Statistics aggregation over completed challenges.
//!
//! Each completion fans out into six independent aggregate updates, all
//! following the same shape: fetch-or-default, mutate in memory, write back.
//! The store exposes no transactions, so every cycle runs under that
//! document's async lock (see [`crate::state::AggregateLocks`]) to keep
//! concurrent completions from silently losing increments. A failure in any
//! one update is logged and swallowed; it never rolls back the completed
//! challenge, the stored result snapshot, or the other updates.

use time::{Duration as TimeDuration, OffsetDateTime, Time};
use tracing::warn;

use crate::{
    dao::{
        models::{
            ChallengeResultEntity, GlobalStatsEntity, NumberSelectionEntity, NumberStatsEntity,
            PlayerInteractionEntity, PlayerPairEntity, RangeStatsEntity, UserStatsEntity,
        },
        stats::{StatsRepository, selection_ids},
    },
    dto::validation::{NUMBER_MAX, NUMBER_MIN, validate_range_bounds},
    error::ServiceError,
    state::{SharedState, lifecycle::MatchOutcome},
};

const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;
const MAX_LEADERBOARD_LIMIT: u32 = 100;
const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 200;
const SUMMARY_LIMIT: u32 = 5;

/// Persist a completed challenge's result snapshot and update every
/// aggregate it feeds.
///
/// The snapshot write is the only hard failure; everything after it is
/// isolated per aggregate and merely logged on error.
pub async fn record_challenge_result(
    state: &SharedState,
    result: &ChallengeResultEntity,
) -> Result<(), ServiceError> {
    let repository = StatsRepository::new(state.require_store().await?);
    repository.put_result(result).await?;

    store_number_selections(&repository, result).await;

    for (user_id, is_creator) in [(&result.from_user, true), (&result.to_user, false)] {
        if let Err(err) = update_user_stats(state, &repository, result, user_id, is_creator).await {
            warn!(
                challenge_id = %result.challenge_id,
                user_id,
                error = %err,
                "failed to update user stats"
            );
        }
    }

    if let Err(err) = update_global_stats(state, &repository, result).await {
        warn!(
            challenge_id = %result.challenge_id,
            error = %err,
            "failed to update global stats"
        );
    }
    if let Err(err) = update_number_stats(state, &repository, result).await {
        warn!(
            challenge_id = %result.challenge_id,
            error = %err,
            "failed to update number stats"
        );
    }
    if let Err(err) = update_range_stats(state, &repository, result).await {
        warn!(
            challenge_id = %result.challenge_id,
            error = %err,
            "failed to update range stats"
        );
    }
    if let Err(err) = update_interaction_stats(state, &repository, result).await {
        warn!(
            challenge_id = %result.challenge_id,
            error = %err,
            "failed to update player interactions"
        );
    }
    if let Err(err) = update_pair_stats(state, &repository, result).await {
        warn!(
            challenge_id = %result.challenge_id,
            error = %err,
            "failed to update player pair stats"
        );
    }

    Ok(())
}

/// Store one selection document per participant for per-number analytics.
async fn store_number_selections(repository: &StatsRepository, result: &ChallengeResultEntity) {
    let (from_id, to_id) = selection_ids(&result.challenge_id);
    let selections = [
        (
            from_id,
            NumberSelectionEntity {
                user_id: result.from_user.clone(),
                number: result.from_user_number,
                selected_at: result.completed_at,
                challenge_id: result.challenge_id.clone(),
                range_min: result.range_min,
                range_max: result.range_max,
            },
        ),
        (
            to_id,
            NumberSelectionEntity {
                user_id: result.to_user.clone(),
                number: result.to_user_number,
                selected_at: result.completed_at,
                challenge_id: result.challenge_id.clone(),
                range_min: result.range_min,
                range_max: result.range_max,
            },
        ),
    ];

    for (id, selection) in selections {
        if let Err(err) = repository.put_selection(&id, &selection).await {
            warn!(
                challenge_id = %result.challenge_id,
                selection_id = %id,
                error = %err,
                "failed to store number selection"
            );
        }
    }
}

async fn update_user_stats(
    state: &SharedState,
    repository: &StatsRepository,
    result: &ChallengeResultEntity,
    user_id: &str,
    is_creator: bool,
) -> Result<(), ServiceError> {
    let _guard = state
        .aggregate_locks()
        .acquire(&StatsRepository::user_stats_lock(user_id))
        .await;

    let now = OffsetDateTime::now_utc();
    let mut stats = repository
        .user_stats(user_id)
        .await?
        .unwrap_or_else(|| UserStatsEntity::fresh(user_id, now));

    stats.total_challenges += 1;
    if is_creator {
        stats.challenges_created += 1;
    } else {
        stats.challenges_received += 1;
    }

    if result.result == MatchOutcome::Match {
        if result.winner.as_deref() == Some(user_id) {
            stats.matches_won += 1;
        } else {
            stats.matches_lost += 1;
        }
    }

    let total_matches = stats.matches_won + stats.matches_lost;
    if total_matches > 0 {
        stats.win_rate = stats.matches_won as f64 / total_matches as f64;
    }

    if let Some(response_time) = result.response_time_for(is_creator) {
        let sample = response_time.as_secs_f64();
        stats.average_response_time = Some(match stats.average_response_time {
            None => response_time,
            Some(average) => {
                let updated = incremental_mean(
                    average.as_secs_f64(),
                    stats.total_challenges,
                    sample,
                );
                std::time::Duration::from_secs_f64(updated)
            }
        });

        let faster = stats
            .fastest_response_time
            .is_none_or(|fastest| response_time < fastest);
        if faster {
            stats.fastest_response_time = Some(response_time);
        }
    }

    stats.last_active = now;
    stats.updated_at = now;
    repository.put_user_stats(&stats).await?;
    Ok(())
}

async fn update_global_stats(
    state: &SharedState,
    repository: &StatsRepository,
    result: &ChallengeResultEntity,
) -> Result<(), ServiceError> {
    let _guard = state
        .aggregate_locks()
        .acquire(&StatsRepository::global_stats_lock())
        .await;

    let now = OffsetDateTime::now_utc();
    let mut stats = repository
        .global_stats()
        .await?
        .unwrap_or_else(|| GlobalStatsEntity::fresh(now));

    stats.total_challenges += 1;
    if result.result == MatchOutcome::Match {
        stats.total_matches += 1;
    }
    stats.overall_success_rate = stats.total_matches as f64 / stats.total_challenges as f64;

    // Period buckets are computed against the clock at update time, not at
    // challenge creation: a delayed aggregation run buckets by *now*.
    let (today_start, week_start, month_start) = period_starts(now);
    if result.created_at >= today_start {
        stats.challenges_today += 1;
    }
    if result.created_at >= week_start {
        stats.challenges_this_week += 1;
    }
    if result.created_at >= month_start {
        stats.challenges_this_month += 1;
    }

    stats.last_updated = now;
    repository.put_global_stats(&stats).await?;
    Ok(())
}

async fn update_number_stats(
    state: &SharedState,
    repository: &StatsRepository,
    result: &ChallengeResultEntity,
) -> Result<(), ServiceError> {
    // Both picks count, independently: two players on the same number
    // increment it twice.
    for number in [result.from_user_number, result.to_user_number] {
        let _guard = state
            .aggregate_locks()
            .acquire(&StatsRepository::number_stats_lock(number))
            .await;

        let mut stats = repository
            .number_stats(number)
            .await?
            .unwrap_or(NumberStatsEntity {
                number,
                times_selected: 0,
                success_rate: 0.0,
                last_selected: None,
            });

        stats.times_selected += 1;
        stats.last_selected = Some(result.completed_at);
        // success_rate stays as stored: recomputing it needs a pass over the
        // full results history for this number.

        repository.put_number_stats(&stats).await?;
    }
    Ok(())
}

async fn update_range_stats(
    state: &SharedState,
    repository: &StatsRepository,
    result: &ChallengeResultEntity,
) -> Result<(), ServiceError> {
    let _guard = state
        .aggregate_locks()
        .acquire(&StatsRepository::range_stats_lock(
            result.range_min,
            result.range_max,
        ))
        .await;

    let mut stats = repository
        .range_stats(result.range_min, result.range_max)
        .await?
        .unwrap_or(RangeStatsEntity {
            range_min: result.range_min,
            range_max: result.range_max,
            times_used: 0,
            success_rate: 0.0,
            average_numbers_in_range: 0.0,
        });

    stats.times_used += 1;

    let numbers = [result.from_user_number, result.to_user_number];
    let inside = numbers
        .iter()
        .filter(|number| (result.range_min..=result.range_max).contains(number))
        .count();
    let sample = inside as f64 / numbers.len() as f64;

    stats.average_numbers_in_range = if stats.times_used == 1 {
        sample
    } else {
        incremental_mean(stats.average_numbers_in_range, stats.times_used, sample)
    };

    repository.put_range_stats(&stats).await?;
    Ok(())
}

async fn update_interaction_stats(
    state: &SharedState,
    repository: &StatsRepository,
    result: &ChallengeResultEntity,
) -> Result<(), ServiceError> {
    for (user_id, sent) in [(&result.from_user, true), (&result.to_user, false)] {
        let _guard = state
            .aggregate_locks()
            .acquire(&StatsRepository::interaction_lock(user_id))
            .await;

        let mut interaction =
            repository
                .interaction(user_id)
                .await?
                .unwrap_or(PlayerInteractionEntity {
                    user_id: user_id.to_string(),
                    challenges_sent: 0,
                    challenges_received: 0,
                    total_interactions: 0,
                    last_interaction: result.completed_at,
                });

        if sent {
            interaction.challenges_sent += 1;
        } else {
            interaction.challenges_received += 1;
        }
        interaction.total_interactions =
            interaction.challenges_sent + interaction.challenges_received;
        interaction.last_interaction = result.completed_at;

        repository.put_interaction(&interaction).await?;
    }
    Ok(())
}

async fn update_pair_stats(
    state: &SharedState,
    repository: &StatsRepository,
    result: &ChallengeResultEntity,
) -> Result<(), ServiceError> {
    let _guard = state
        .aggregate_locks()
        .acquire(&StatsRepository::pair_lock(
            &result.from_user,
            &result.to_user,
        ))
        .await;

    let (user_a, user_b) = PlayerPairEntity::ordered(&result.from_user, &result.to_user);
    let mut pair = repository
        .pair(user_a, user_b)
        .await?
        .unwrap_or(PlayerPairEntity {
            user_a: user_a.to_owned(),
            user_b: user_b.to_owned(),
            total_challenges: 0,
            challenges_from_a: 0,
            challenges_from_b: 0,
            matches: 0,
            success_rate: 0.0,
            last_challenge: result.completed_at,
        });

    pair.total_challenges += 1;
    if result.from_user == pair.user_a {
        pair.challenges_from_a += 1;
    } else {
        pair.challenges_from_b += 1;
    }
    if result.result == MatchOutcome::Match {
        pair.matches += 1;
    }
    pair.success_rate = pair.matches as f64 / pair.total_challenges as f64;
    pair.last_challenge = result.completed_at;

    repository.put_pair(&pair).await?;
    Ok(())
}

/// Running-mean update: `(old * (n - 1) + sample) / n`.
fn incremental_mean(old: f64, count: u64, sample: f64) -> f64 {
    (old * (count as f64 - 1.0) + sample) / count as f64
}

/// UTC period boundaries at the moment of the update: midnight today, the
/// Monday week start, and the first of the month.
fn period_starts(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime, OffsetDateTime) {
    let today_start = now.replace_time(Time::MIDNIGHT);
    let week_start = today_start
        - TimeDuration::days(i64::from(today_start.weekday().number_days_from_monday()));
    let month_start = today_start.replace_day(1).unwrap_or(today_start);
    (today_start, week_start, month_start)
}

/// Per-user counters; subject only.
pub async fn get_user_stats(
    state: &SharedState,
    caller: &str,
    user_id: &str,
) -> Result<UserStatsEntity, ServiceError> {
    if caller != user_id {
        return Err(ServiceError::Forbidden(
            "not authorized to view other users' stats".into(),
        ));
    }

    let repository = StatsRepository::new(state.require_store().await?);
    repository
        .user_stats(user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("user statistics not found".into()))
}

/// Global counters.
pub async fn get_global_stats(state: &SharedState) -> Result<GlobalStatsEntity, ServiceError> {
    let repository = StatsRepository::new(state.require_store().await?);
    repository
        .global_stats()
        .await?
        .ok_or_else(|| ServiceError::NotFound("global statistics not found".into()))
}

/// Counters for one number.
pub async fn get_number_stats(
    state: &SharedState,
    number: i64,
) -> Result<NumberStatsEntity, ServiceError> {
    if !(NUMBER_MIN..=NUMBER_MAX).contains(&number) {
        return Err(ServiceError::InvalidInput(format!(
            "number must be between {NUMBER_MIN} and {NUMBER_MAX}"
        )));
    }

    let repository = StatsRepository::new(state.require_store().await?);
    repository
        .number_stats(number)
        .await?
        .ok_or_else(|| ServiceError::NotFound("number statistics not found".into()))
}

/// Counters for one declared range.
pub async fn get_range_stats(
    state: &SharedState,
    range_min: i64,
    range_max: i64,
) -> Result<RangeStatsEntity, ServiceError> {
    validate_range_bounds(range_min, range_max)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let repository = StatsRepository::new(state.require_store().await?);
    repository
        .range_stats(range_min, range_max)
        .await?
        .ok_or_else(|| ServiceError::NotFound("range statistics not found".into()))
}

/// Most used numbers, by usage count or stored success rate.
pub async fn get_top_numbers(
    state: &SharedState,
    limit: Option<u32>,
    by_usage: bool,
) -> Result<Vec<NumberStatsEntity>, ServiceError> {
    let limit = clamp_limit(limit, DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT);
    let repository = StatsRepository::new(state.require_store().await?);

    let mut numbers = repository.numbers_selected().await?;
    if by_usage {
        numbers.sort_by(|a, b| b.times_selected.cmp(&a.times_selected));
    } else {
        numbers.sort_by(|a, b| b.success_rate.total_cmp(&a.success_rate));
    }
    numbers.truncate(limit);
    Ok(numbers)
}

/// Most used ranges.
pub async fn get_top_ranges(
    state: &SharedState,
    limit: Option<u32>,
) -> Result<Vec<RangeStatsEntity>, ServiceError> {
    let limit = clamp_limit(limit, DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT);
    let repository = StatsRepository::new(state.require_store().await?);

    let mut ranges = repository.ranges_used().await?;
    ranges.sort_by(|a, b| b.times_used.cmp(&a.times_used));
    ranges.truncate(limit);
    Ok(ranges)
}

/// A user's completed challenges, newest completion first; subject only.
pub async fn get_challenge_history(
    state: &SharedState,
    caller: &str,
    user_id: &str,
    limit: Option<u32>,
) -> Result<Vec<ChallengeResultEntity>, ServiceError> {
    if caller != user_id {
        return Err(ServiceError::Forbidden(
            "not authorized to view other users' history".into(),
        ));
    }

    let limit = clamp_limit(limit, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
    let repository = StatsRepository::new(state.require_store().await?);

    let mut results = repository.results_for_user(user_id).await?;
    results.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    results.truncate(limit);
    Ok(results)
}

/// Users with the most recorded interactions.
pub async fn get_most_challenged_players(
    state: &SharedState,
    limit: Option<u32>,
) -> Result<Vec<PlayerInteractionEntity>, ServiceError> {
    let limit = clamp_limit(limit, DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT);
    let repository = StatsRepository::new(state.require_store().await?);

    let mut interactions = repository.interactions().await?;
    interactions.sort_by(|a, b| b.total_interactions.cmp(&a.total_interactions));
    interactions.truncate(limit);
    Ok(interactions)
}

/// Pairs with the most completed challenges between them.
pub async fn get_most_active_pairs(
    state: &SharedState,
    limit: Option<u32>,
) -> Result<Vec<PlayerPairEntity>, ServiceError> {
    let limit = clamp_limit(limit, DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT);
    let repository = StatsRepository::new(state.require_store().await?);

    let mut pairs = repository.pairs().await?;
    pairs.sort_by(|a, b| b.total_challenges.cmp(&a.total_challenges));
    pairs.truncate(limit);
    Ok(pairs)
}

/// Pair records involving the user, most active first; subject only.
pub async fn get_user_friends_activity(
    state: &SharedState,
    caller: &str,
    user_id: &str,
    limit: Option<u32>,
) -> Result<Vec<PlayerPairEntity>, ServiceError> {
    if caller != user_id {
        return Err(ServiceError::Forbidden(
            "not authorized to view other users' friends activity".into(),
        ));
    }

    let limit = clamp_limit(limit, DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT);
    let repository = StatsRepository::new(state.require_store().await?);

    let mut pairs = repository.pairs_for_user(user_id).await?;
    pairs.sort_by(|a, b| b.total_challenges.cmp(&a.total_challenges));
    pairs.truncate(limit);
    Ok(pairs)
}

/// Recipients the user challenges most often; subject only.
///
/// Computed by scanning the user's sent results and counting per recipient,
/// not from the pair aggregate, so it stays correct even when a pair update
/// was lost.
pub async fn get_user_challenge_recipients(
    state: &SharedState,
    caller: &str,
    user_id: &str,
    limit: Option<u32>,
) -> Result<Vec<PlayerInteractionEntity>, ServiceError> {
    if caller != user_id {
        return Err(ServiceError::Forbidden(
            "not authorized to view other users' challenge recipients".into(),
        ));
    }

    let limit = clamp_limit(limit, DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT);
    let repository = StatsRepository::new(state.require_store().await?);
    let results = repository.results_from_user(user_id).await?;

    let mut per_recipient: indexmap::IndexMap<String, PlayerInteractionEntity> =
        indexmap::IndexMap::new();
    for result in results {
        let entry = per_recipient
            .entry(result.to_user.clone())
            .or_insert_with(|| PlayerInteractionEntity {
                user_id: result.to_user.clone(),
                challenges_sent: 0,
                challenges_received: 0,
                total_interactions: 0,
                last_interaction: result.completed_at,
            });
        entry.challenges_received += 1;
        entry.total_interactions += 1;
        if result.completed_at > entry.last_interaction {
            entry.last_interaction = result.completed_at;
        }
    }

    let mut recipients: Vec<PlayerInteractionEntity> = per_recipient.into_values().collect();
    recipients.sort_by(|a, b| b.total_interactions.cmp(&a.total_interactions));
    recipients.truncate(limit);
    Ok(recipients)
}

/// Everything a dashboard needs in one call: global counters plus the top
/// five of each leaderboard.
pub async fn get_analytics_summary(
    state: &SharedState,
) -> Result<crate::dto::stats::AnalyticsSummaryDto, ServiceError> {
    use crate::dto::stats::AnalyticsSummaryDto;

    let global_stats = match get_global_stats(state).await {
        Ok(stats) => Some(stats.into()),
        Err(ServiceError::NotFound(_)) => None,
        Err(err) => return Err(err),
    };

    let top_numbers = get_top_numbers(state, Some(SUMMARY_LIMIT), true).await?;
    let top_ranges = get_top_ranges(state, Some(SUMMARY_LIMIT)).await?;
    let most_challenged = get_most_challenged_players(state, Some(SUMMARY_LIMIT)).await?;
    let most_active = get_most_active_pairs(state, Some(SUMMARY_LIMIT)).await?;

    Ok(AnalyticsSummaryDto {
        global_stats,
        top_numbers: top_numbers.into_iter().map(Into::into).collect(),
        top_ranges: top_ranges.into_iter().map(Into::into).collect(),
        most_challenged_players: most_challenged.into_iter().map(Into::into).collect(),
        most_active_pairs: most_active.into_iter().map(Into::into).collect(),
        timestamp: crate::dto::format_timestamp(OffsetDateTime::now_utc()),
    })
}

fn clamp_limit(limit: Option<u32>, default: u32, max: u32) -> usize {
    limit.unwrap_or(default).clamp(1, max) as usize
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::BoxFuture;
    use serde_json::Value;
    use time::OffsetDateTime;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            document_store::{DocumentStore, Filter, memory::MemoryStore},
            storage::{StorageError, StorageResult},
        },
        state::AppState,
    };

    async fn test_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(MemoryStore::new())).await;
        state
    }

    fn sample_result(challenge_id: &str, from: &str, to: &str, matched: bool) -> ChallengeResultEntity {
        let now = OffsetDateTime::now_utc();
        ChallengeResultEntity {
            challenge_id: challenge_id.to_owned(),
            from_user: from.to_owned(),
            to_user: to.to_owned(),
            description: "pick a number".into(),
            range_min: 1,
            range_max: 10,
            from_user_number: 5,
            to_user_number: if matched { 5 } else { 7 },
            result: if matched {
                MatchOutcome::Match
            } else {
                MatchOutcome::NoMatch
            },
            winner: matched.then(|| from.to_owned()),
            created_at: now - TimeDuration::minutes(5),
            completed_at: now,
            response_time_from_user: Some(Duration::from_secs(30)),
            response_time_to_user: Some(Duration::from_secs(60)),
        }
    }

    #[tokio::test]
    async fn user_stats_track_wins_losses_and_win_rate() {
        let state = test_state().await;

        // Alice initiates three challenges against Bob and wins two.
        for (id, matched) in [("c1", true), ("c2", true), ("c3", false)] {
            record_challenge_result(&state, &sample_result(id, "uid-alice", "uid-bob", matched))
                .await
                .unwrap();
        }

        let alice = get_user_stats(&state, "uid-alice", "uid-alice").await.unwrap();
        assert_eq!(alice.total_challenges, 3);
        assert_eq!(alice.challenges_created, 3);
        assert_eq!(alice.challenges_received, 0);
        assert_eq!(alice.matches_won, 2);
        assert_eq!(alice.matches_lost, 0);
        assert!((alice.win_rate - 1.0).abs() < f64::EPSILON);

        let bob = get_user_stats(&state, "uid-bob", "uid-bob").await.unwrap();
        assert_eq!(bob.total_challenges, 3);
        assert_eq!(bob.challenges_received, 3);
        assert_eq!(bob.matches_won, 0);
        assert_eq!(bob.matches_lost, 2);
        assert!((bob.win_rate - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn response_time_running_average_uses_post_increment_count() {
        let state = test_state().await;

        let mut first = sample_result("c1", "uid-alice", "uid-bob", false);
        first.response_time_from_user = Some(Duration::from_secs(2));
        record_challenge_result(&state, &first).await.unwrap();

        let mut second = sample_result("c2", "uid-alice", "uid-bob", false);
        second.response_time_from_user = Some(Duration::from_secs(4));
        record_challenge_result(&state, &second).await.unwrap();

        let alice = get_user_stats(&state, "uid-alice", "uid-alice").await.unwrap();
        let average = alice.average_response_time.unwrap().as_secs_f64();
        assert!((average - 3.0).abs() < 1e-9);
        assert_eq!(
            alice.fastest_response_time,
            Some(Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn pair_stats_use_one_record_for_both_directions() {
        let state = test_state().await;

        record_challenge_result(&state, &sample_result("c1", "uid-bob", "uid-alice", true))
            .await
            .unwrap();
        record_challenge_result(&state, &sample_result("c2", "uid-alice", "uid-bob", false))
            .await
            .unwrap();

        let pairs = get_most_active_pairs(&state, Some(10)).await.unwrap();
        assert_eq!(pairs.len(), 1);

        let pair = &pairs[0];
        assert_eq!(pair.user_a, "uid-alice");
        assert_eq!(pair.user_b, "uid-bob");
        assert_eq!(pair.total_challenges, 2);
        assert_eq!(pair.challenges_from_a, 1);
        assert_eq!(pair.challenges_from_b, 1);
        assert_eq!(pair.matches, 1);
        assert!((pair.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn matching_numbers_increment_the_number_twice() {
        let state = test_state().await;

        record_challenge_result(&state, &sample_result("c1", "uid-alice", "uid-bob", true))
            .await
            .unwrap();

        let five = get_number_stats(&state, 5).await.unwrap();
        assert_eq!(five.times_selected, 2);
        assert!(five.last_selected.is_some());
        assert!((five.success_rate - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn range_stats_keep_the_running_in_range_average() {
        let state = test_state().await;

        record_challenge_result(&state, &sample_result("c1", "uid-alice", "uid-bob", false))
            .await
            .unwrap();
        record_challenge_result(&state, &sample_result("c2", "uid-alice", "uid-bob", true))
            .await
            .unwrap();

        let range = get_range_stats(&state, 1, 10).await.unwrap();
        assert_eq!(range.times_used, 2);
        assert!((range.average_numbers_in_range - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn global_stats_count_matches_and_recent_periods() {
        let state = test_state().await;

        record_challenge_result(&state, &sample_result("c1", "uid-alice", "uid-bob", true))
            .await
            .unwrap();
        record_challenge_result(&state, &sample_result("c2", "uid-alice", "uid-bob", false))
            .await
            .unwrap();

        let global = get_global_stats(&state).await.unwrap();
        assert_eq!(global.total_challenges, 2);
        assert_eq!(global.total_matches, 1);
        assert!((global.overall_success_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(global.challenges_today, 2);
        assert_eq!(global.challenges_this_week, 2);
        assert_eq!(global.challenges_this_month, 2);
    }

    #[tokio::test]
    async fn stale_creation_timestamps_miss_the_period_buckets() {
        let state = test_state().await;

        let mut old = sample_result("c1", "uid-alice", "uid-bob", false);
        old.created_at = time::macros::datetime!(2000-01-01 00:00 UTC);
        record_challenge_result(&state, &old).await.unwrap();

        let global = get_global_stats(&state).await.unwrap();
        assert_eq!(global.total_challenges, 1);
        assert_eq!(global.challenges_today, 0);
        assert_eq!(global.challenges_this_week, 0);
        assert_eq!(global.challenges_this_month, 0);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let state = test_state().await;

        for (index, id) in ["c1", "c2", "c3"].iter().enumerate() {
            let mut result = sample_result(id, "uid-alice", "uid-bob", false);
            result.completed_at = OffsetDateTime::now_utc() + TimeDuration::seconds(index as i64);
            record_challenge_result(&state, &result).await.unwrap();
        }

        let history = get_challenge_history(&state, "uid-alice", "uid-alice", Some(2))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].challenge_id, "c3");
        assert_eq!(history[1].challenge_id, "c2");
    }

    #[tokio::test]
    async fn reads_are_subject_scoped() {
        let state = test_state().await;

        let err = get_user_stats(&state, "uid-mallory", "uid-alice")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = get_challenge_history(&state, "uid-mallory", "uid-alice", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn reads_without_mutation_are_idempotent() {
        let state = test_state().await;
        record_challenge_result(&state, &sample_result("c1", "uid-alice", "uid-bob", true))
            .await
            .unwrap();

        let first = get_user_stats(&state, "uid-alice", "uid-alice").await.unwrap();
        let second = get_user_stats(&state, "uid-alice", "uid-alice").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn recipients_are_counted_from_sent_results() {
        let state = test_state().await;

        record_challenge_result(&state, &sample_result("c1", "uid-alice", "uid-bob", false))
            .await
            .unwrap();
        record_challenge_result(&state, &sample_result("c2", "uid-alice", "uid-bob", true))
            .await
            .unwrap();
        record_challenge_result(&state, &sample_result("c3", "uid-alice", "uid-carol", false))
            .await
            .unwrap();
        // Received challenges must not count towards recipients.
        record_challenge_result(&state, &sample_result("c4", "uid-bob", "uid-alice", false))
            .await
            .unwrap();

        let recipients = get_user_challenge_recipients(&state, "uid-alice", "uid-alice", None)
            .await
            .unwrap();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].user_id, "uid-bob");
        assert_eq!(recipients[0].total_interactions, 2);
        assert_eq!(recipients[1].user_id, "uid-carol");
        assert_eq!(recipients[1].total_interactions, 1);
    }

    #[tokio::test]
    async fn number_bounds_are_validated_on_reads() {
        let state = test_state().await;
        assert!(matches!(
            get_number_stats(&state, 0).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            get_number_stats(&state, 101).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            get_range_stats(&state, 5, 5).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
    }

    /// Store wrapper that fails every write to one collection, used to prove
    /// aggregate isolation.
    #[derive(Clone)]
    struct FailingCollectionStore {
        inner: MemoryStore,
        failing_collection: &'static str,
    }

    impl FailingCollectionStore {
        fn failure() -> StorageError {
            StorageError::unavailable(
                "injected failure".into(),
                std::io::Error::new(std::io::ErrorKind::Other, "injected"),
            )
        }
    }

    impl DocumentStore for FailingCollectionStore {
        fn create(
            &self,
            collection: &str,
            doc: Value,
            id: Option<String>,
        ) -> BoxFuture<'static, StorageResult<String>> {
            if collection == self.failing_collection {
                return Box::pin(async { Err(Self::failure()) });
            }
            self.inner.create(collection, doc, id)
        }

        fn get(
            &self,
            collection: &str,
            id: &str,
        ) -> BoxFuture<'static, StorageResult<Option<Value>>> {
            self.inner.get(collection, id)
        }

        fn update(
            &self,
            collection: &str,
            id: &str,
            patch: Value,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.update(collection, id, patch)
        }

        fn delete(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete(collection, id)
        }

        fn query(
            &self,
            collection: &str,
            filter: Filter,
        ) -> BoxFuture<'static, StorageResult<Vec<Value>>> {
            self.inner.query(collection, filter)
        }

        fn query_multi(
            &self,
            collection: &str,
            filters: Vec<Filter>,
        ) -> BoxFuture<'static, StorageResult<Vec<Value>>> {
            self.inner.query_multi(collection, filters)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
    }

    #[tokio::test]
    async fn one_failing_aggregate_never_blocks_the_others() {
        let state = AppState::new(AppConfig::default());
        state
            .install_store(Arc::new(FailingCollectionStore {
                inner: MemoryStore::new(),
                failing_collection: "range_stats",
            }))
            .await;

        // The range update fails internally, the call still succeeds.
        record_challenge_result(&state, &sample_result("c1", "uid-alice", "uid-bob", true))
            .await
            .unwrap();

        assert!(get_user_stats(&state, "uid-alice", "uid-alice").await.is_ok());
        assert!(get_global_stats(&state).await.is_ok());
        assert!(get_number_stats(&state, 5).await.is_ok());
        assert!(matches!(
            get_range_stats(&state, 1, 10).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
