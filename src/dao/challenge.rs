use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::dao::{
    document_store::{DocumentStore, Filter},
    models::ChallengeEntity,
    storage::{StorageError, StorageResult},
};

const CHALLENGE_COLLECTION: &str = "challenges";

/// Data access object encapsulating document-store interaction for challenges.
#[derive(Clone)]
pub struct ChallengeRepository {
    store: Arc<dyn DocumentStore>,
}

impl ChallengeRepository {
    /// Wrap a store handle.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persist a brand-new challenge, letting the store mint the id.
    /// Returns the entity with its assigned id filled in.
    pub async fn create(&self, mut challenge: ChallengeEntity) -> StorageResult<ChallengeEntity> {
        let doc = encode(CHALLENGE_COLLECTION, &challenge.id, &challenge)?;
        let id = self.store.create(CHALLENGE_COLLECTION, doc, None).await?;
        challenge.id = id;
        Ok(challenge)
    }

    /// Fetch a challenge by id.
    pub async fn find(&self, id: &str) -> StorageResult<Option<ChallengeEntity>> {
        let Some(doc) = self.store.get(CHALLENGE_COLLECTION, id).await? else {
            return Ok(None);
        };
        decode(CHALLENGE_COLLECTION, id, doc).map(Some)
    }

    /// Write back a mutated challenge, reporting whether the document existed.
    pub async fn save(&self, challenge: &ChallengeEntity) -> StorageResult<bool> {
        let doc = encode(CHALLENGE_COLLECTION, &challenge.id, challenge)?;
        self.store
            .update(CHALLENGE_COLLECTION, &challenge.id, doc)
            .await
    }

    /// Every challenge where the user appears on either side.
    pub async fn list_for_user(&self, user_id: &str) -> StorageResult<Vec<ChallengeEntity>> {
        let docs = self
            .store
            .query_multi(
                CHALLENGE_COLLECTION,
                vec![
                    Filter::eq("from_user", user_id),
                    Filter::eq("to_user", user_id),
                ],
            )
            .await?;
        Ok(decode_lossy(CHALLENGE_COLLECTION, docs))
    }

    /// Every challenge the user initiated.
    pub async fn created_by(&self, user_id: &str) -> StorageResult<Vec<ChallengeEntity>> {
        let docs = self
            .store
            .query(CHALLENGE_COLLECTION, Filter::eq("from_user", user_id))
            .await?;
        Ok(decode_lossy(CHALLENGE_COLLECTION, docs))
    }
}

pub(crate) fn encode<T: serde::Serialize>(
    collection: &str,
    id: &str,
    entity: &T,
) -> StorageResult<Value> {
    serde_json::to_value(entity).map_err(|source| StorageError::corrupted(collection, id, source))
}

pub(crate) fn decode<T: DeserializeOwned>(
    collection: &str,
    id: &str,
    doc: Value,
) -> StorageResult<T> {
    serde_json::from_value(doc).map_err(|source| StorageError::corrupted(collection, id, source))
}

/// Decode a batch of documents, skipping (and logging) any that no longer
/// match the entity shape. Mirrors how list endpoints tolerate stray
/// documents in a schemaless collection.
pub(crate) fn decode_lossy<T: DeserializeOwned>(collection: &str, docs: Vec<Value>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<missing>")
                .to_owned();
            match serde_json::from_value(doc) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    warn!(collection, id, error = %err, "skipping malformed document");
                    None
                }
            }
        })
        .collect()
}
