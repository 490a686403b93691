use std::sync::Arc;

use crate::dao::{
    challenge::{decode, decode_lossy, encode},
    document_store::{DocumentStore, Filter},
    models::{
        ChallengeResultEntity, GlobalStatsEntity, NumberSelectionEntity, NumberStatsEntity,
        PlayerInteractionEntity, PlayerPairEntity, RangeStatsEntity, UserStatsEntity,
    },
    storage::StorageResult,
};

const RESULT_COLLECTION: &str = "challenge_results";
const SELECTION_COLLECTION: &str = "number_selections";
const USER_STATS_COLLECTION: &str = "user_game_stats";
const GLOBAL_STATS_COLLECTION: &str = "global_game_stats";
const NUMBER_STATS_COLLECTION: &str = "number_stats";
const RANGE_STATS_COLLECTION: &str = "range_stats";
const INTERACTION_COLLECTION: &str = "player_interactions";
const PAIR_COLLECTION: &str = "player_pairs";

/// Id of the singleton global-stats document.
pub const GLOBAL_STATS_ID: &str = "main";

/// Data access object for the results history and the six aggregate
/// collections. Aggregate writes are upserts; the serialization of
/// concurrent read-modify-write cycles is the caller's concern.
#[derive(Clone)]
pub struct StatsRepository {
    store: Arc<dyn DocumentStore>,
}

impl StatsRepository {
    /// Wrap a store handle.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persist the immutable result snapshot, keyed by challenge id.
    pub async fn put_result(&self, result: &ChallengeResultEntity) -> StorageResult<()> {
        let doc = encode(RESULT_COLLECTION, &result.challenge_id, result)?;
        self.store
            .create(RESULT_COLLECTION, doc, Some(result.challenge_id.clone()))
            .await?;
        Ok(())
    }

    /// Results involving the user on either side.
    pub async fn results_for_user(
        &self,
        user_id: &str,
    ) -> StorageResult<Vec<ChallengeResultEntity>> {
        let docs = self
            .store
            .query_multi(
                RESULT_COLLECTION,
                vec![
                    Filter::eq("from_user", user_id),
                    Filter::eq("to_user", user_id),
                ],
            )
            .await?;
        Ok(decode_lossy(RESULT_COLLECTION, docs))
    }

    /// Results the user initiated.
    pub async fn results_from_user(
        &self,
        user_id: &str,
    ) -> StorageResult<Vec<ChallengeResultEntity>> {
        let docs = self
            .store
            .query(RESULT_COLLECTION, Filter::eq("from_user", user_id))
            .await?;
        Ok(decode_lossy(RESULT_COLLECTION, docs))
    }

    /// Persist one participant's number selection under a deterministic id.
    pub async fn put_selection(
        &self,
        id: &str,
        selection: &NumberSelectionEntity,
    ) -> StorageResult<()> {
        let doc = encode(SELECTION_COLLECTION, id, selection)?;
        self.store
            .create(SELECTION_COLLECTION, doc, Some(id.to_owned()))
            .await?;
        Ok(())
    }

    /// Per-user counters document.
    pub async fn user_stats(&self, user_id: &str) -> StorageResult<Option<UserStatsEntity>> {
        let Some(doc) = self.store.get(USER_STATS_COLLECTION, user_id).await? else {
            return Ok(None);
        };
        decode(USER_STATS_COLLECTION, user_id, doc).map(Some)
    }

    /// Upsert per-user counters.
    pub async fn put_user_stats(&self, stats: &UserStatsEntity) -> StorageResult<()> {
        let doc = encode(USER_STATS_COLLECTION, &stats.user_id, stats)?;
        self.store
            .create(USER_STATS_COLLECTION, doc, Some(stats.user_id.clone()))
            .await?;
        Ok(())
    }

    /// The singleton global counters document.
    pub async fn global_stats(&self) -> StorageResult<Option<GlobalStatsEntity>> {
        let Some(doc) = self
            .store
            .get(GLOBAL_STATS_COLLECTION, GLOBAL_STATS_ID)
            .await?
        else {
            return Ok(None);
        };
        decode(GLOBAL_STATS_COLLECTION, GLOBAL_STATS_ID, doc).map(Some)
    }

    /// Upsert the singleton global counters document.
    pub async fn put_global_stats(&self, stats: &GlobalStatsEntity) -> StorageResult<()> {
        let doc = encode(GLOBAL_STATS_COLLECTION, GLOBAL_STATS_ID, stats)?;
        self.store
            .create(GLOBAL_STATS_COLLECTION, doc, Some(GLOBAL_STATS_ID.into()))
            .await?;
        Ok(())
    }

    /// Counters for one number.
    pub async fn number_stats(&self, number: i64) -> StorageResult<Option<NumberStatsEntity>> {
        let id = number.to_string();
        let Some(doc) = self.store.get(NUMBER_STATS_COLLECTION, &id).await? else {
            return Ok(None);
        };
        decode(NUMBER_STATS_COLLECTION, &id, doc).map(Some)
    }

    /// Upsert counters for one number.
    pub async fn put_number_stats(&self, stats: &NumberStatsEntity) -> StorageResult<()> {
        let id = stats.number.to_string();
        let doc = encode(NUMBER_STATS_COLLECTION, &id, stats)?;
        self.store
            .create(NUMBER_STATS_COLLECTION, doc, Some(id))
            .await?;
        Ok(())
    }

    /// Every number that has been picked at least once.
    pub async fn numbers_selected(&self) -> StorageResult<Vec<NumberStatsEntity>> {
        let docs = self
            .store
            .query(NUMBER_STATS_COLLECTION, Filter::gt("times_selected", 0))
            .await?;
        Ok(decode_lossy(NUMBER_STATS_COLLECTION, docs))
    }

    /// Counters for one declared range.
    pub async fn range_stats(&self, min: i64, max: i64) -> StorageResult<Option<RangeStatsEntity>> {
        let id = RangeStatsEntity::key(min, max);
        let Some(doc) = self.store.get(RANGE_STATS_COLLECTION, &id).await? else {
            return Ok(None);
        };
        decode(RANGE_STATS_COLLECTION, &id, doc).map(Some)
    }

    /// Upsert counters for one declared range.
    pub async fn put_range_stats(&self, stats: &RangeStatsEntity) -> StorageResult<()> {
        let id = RangeStatsEntity::key(stats.range_min, stats.range_max);
        let doc = encode(RANGE_STATS_COLLECTION, &id, stats)?;
        self.store
            .create(RANGE_STATS_COLLECTION, doc, Some(id))
            .await?;
        Ok(())
    }

    /// Every range that has been used at least once.
    pub async fn ranges_used(&self) -> StorageResult<Vec<RangeStatsEntity>> {
        let docs = self
            .store
            .query(RANGE_STATS_COLLECTION, Filter::gt("times_used", 0))
            .await?;
        Ok(decode_lossy(RANGE_STATS_COLLECTION, docs))
    }

    /// Interaction tallies for one user.
    pub async fn interaction(
        &self,
        user_id: &str,
    ) -> StorageResult<Option<PlayerInteractionEntity>> {
        let Some(doc) = self.store.get(INTERACTION_COLLECTION, user_id).await? else {
            return Ok(None);
        };
        decode(INTERACTION_COLLECTION, user_id, doc).map(Some)
    }

    /// Upsert interaction tallies for one user.
    pub async fn put_interaction(&self, entity: &PlayerInteractionEntity) -> StorageResult<()> {
        let doc = encode(INTERACTION_COLLECTION, &entity.user_id, entity)?;
        self.store
            .create(INTERACTION_COLLECTION, doc, Some(entity.user_id.clone()))
            .await?;
        Ok(())
    }

    /// Every user with at least one recorded interaction.
    pub async fn interactions(&self) -> StorageResult<Vec<PlayerInteractionEntity>> {
        let docs = self
            .store
            .query(INTERACTION_COLLECTION, Filter::gt("total_interactions", 0))
            .await?;
        Ok(decode_lossy(INTERACTION_COLLECTION, docs))
    }

    /// Pair record for two users, whichever order they are given in.
    pub async fn pair(&self, left: &str, right: &str) -> StorageResult<Option<PlayerPairEntity>> {
        let id = PlayerPairEntity::key(left, right);
        let Some(doc) = self.store.get(PAIR_COLLECTION, &id).await? else {
            return Ok(None);
        };
        decode(PAIR_COLLECTION, &id, doc).map(Some)
    }

    /// Upsert a pair record.
    pub async fn put_pair(&self, entity: &PlayerPairEntity) -> StorageResult<()> {
        let id = PlayerPairEntity::key(&entity.user_a, &entity.user_b);
        let doc = encode(PAIR_COLLECTION, &id, entity)?;
        self.store.create(PAIR_COLLECTION, doc, Some(id)).await?;
        Ok(())
    }

    /// Every pair with at least one completed challenge.
    pub async fn pairs(&self) -> StorageResult<Vec<PlayerPairEntity>> {
        let docs = self
            .store
            .query(PAIR_COLLECTION, Filter::gt("total_challenges", 0))
            .await?;
        Ok(decode_lossy(PAIR_COLLECTION, docs))
    }

    /// Every pair involving the given user.
    pub async fn pairs_for_user(&self, user_id: &str) -> StorageResult<Vec<PlayerPairEntity>> {
        let docs = self
            .store
            .query_multi(
                PAIR_COLLECTION,
                vec![Filter::eq("user_a", user_id), Filter::eq("user_b", user_id)],
            )
            .await?;
        Ok(decode_lossy(PAIR_COLLECTION, docs))
    }

    /// Aggregate lock keys, namespaced by collection so different aggregates
    /// for the same underlying user never contend.
    pub fn lock_key(collection: &str, id: &str) -> String {
        format!("{collection}/{id}")
    }

    /// Lock key for the per-user counters document.
    pub fn user_stats_lock(user_id: &str) -> String {
        Self::lock_key(USER_STATS_COLLECTION, user_id)
    }

    /// Lock key for the singleton global counters document.
    pub fn global_stats_lock() -> String {
        Self::lock_key(GLOBAL_STATS_COLLECTION, GLOBAL_STATS_ID)
    }

    /// Lock key for one number's counters document.
    pub fn number_stats_lock(number: i64) -> String {
        Self::lock_key(NUMBER_STATS_COLLECTION, &number.to_string())
    }

    /// Lock key for one range's counters document.
    pub fn range_stats_lock(min: i64, max: i64) -> String {
        Self::lock_key(RANGE_STATS_COLLECTION, &RangeStatsEntity::key(min, max))
    }

    /// Lock key for one user's interaction tallies.
    pub fn interaction_lock(user_id: &str) -> String {
        Self::lock_key(INTERACTION_COLLECTION, user_id)
    }

    /// Lock key for one pair record.
    pub fn pair_lock(left: &str, right: &str) -> String {
        Self::lock_key(PAIR_COLLECTION, &PlayerPairEntity::key(left, right))
    }
}

/// Deterministic ids for the two per-challenge selection documents.
pub fn selection_ids(challenge_id: &str) -> (String, String) {
    (
        format!("{challenge_id}_from"),
        format!("{challenge_id}_to"),
    )
}
