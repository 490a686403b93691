//! In-memory [`DocumentStore`] backend.
//!
//! Used by the test suite and by local development runs
//! (`STORE_BACKEND=memory`). Mirrors the merge/query semantics the MongoDB
//! backend provides so service tests exercise the same contract.

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentStore, Filter};
use crate::dao::storage::StorageResult;

type Collections = HashMap<String, IndexMap<String, Value>>;

/// Volatile document store keeping every collection in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, collection: &str, mut doc: Value, id: Option<String>) -> String {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if let Value::Object(fields) = &mut doc {
            fields.insert("id".into(), Value::String(id.clone()));
        }

        let mut guard = self.collections.write().await;
        guard
            .entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), doc);
        id
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> bool {
        let mut guard = self.collections.write().await;
        let Some(docs) = guard.get_mut(collection) else {
            return false;
        };
        let Some(existing) = docs.get_mut(id) else {
            return false;
        };

        if let (Value::Object(fields), Value::Object(updates)) = (existing, patch) {
            for (key, value) in updates {
                fields.insert(key, value);
            }
        }
        true
    }

    async fn scan(&self, collection: &str, predicate: impl Fn(&Value) -> bool) -> Vec<Value> {
        let guard = self.collections.read().await;
        guard
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| predicate(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl DocumentStore for MemoryStore {
    fn create(
        &self,
        collection: &str,
        doc: Value,
        id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move { Ok(store.insert(&collection, doc, id).await) })
    }

    fn get(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        let id = id.to_owned();
        Box::pin(async move {
            let guard = store.collections.read().await;
            Ok(guard
                .get(&collection)
                .and_then(|docs| docs.get(&id))
                .cloned())
        })
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let collection = collection.to_owned();
        let id = id.to_owned();
        Box::pin(async move { Ok(store.merge(&collection, &id, patch).await) })
    }

    fn delete(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let collection = collection.to_owned();
        let id = id.to_owned();
        Box::pin(async move {
            let mut guard = store.collections.write().await;
            Ok(guard
                .get_mut(&collection)
                .is_some_and(|docs| docs.shift_remove(&id).is_some()))
        })
    }

    fn query(
        &self,
        collection: &str,
        filter: Filter,
    ) -> BoxFuture<'static, StorageResult<Vec<Value>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move { Ok(store.scan(&collection, |doc| filter.matches(doc)).await) })
    }

    fn query_multi(
        &self,
        collection: &str,
        filters: Vec<Filter>,
    ) -> BoxFuture<'static, StorageResult<Vec<Value>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut seen = std::collections::HashSet::new();
            Ok(store
                .scan(&collection, |doc| {
                    filters.iter().any(|filter| filter.matches(doc))
                })
                .await
                .into_iter()
                .filter(|doc| {
                    doc.get("id")
                        .and_then(Value::as_str)
                        .is_none_or(|id| seen.insert(id.to_owned()))
                })
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_injects_generated_id() {
        let store = MemoryStore::new();
        let id = store
            .create("challenges", json!({"status": "pending"}), None)
            .await
            .unwrap();

        let doc = store.get("challenges", &id).await.unwrap().unwrap();
        assert_eq!(doc["id"], Value::String(id));
        assert_eq!(doc["status"], "pending");
    }

    #[tokio::test]
    async fn update_merges_top_level_fields() {
        let store = MemoryStore::new();
        let id = store
            .create("challenges", json!({"status": "pending", "a": 1}), None)
            .await
            .unwrap();

        let found = store
            .update("challenges", &id, json!({"status": "accepted"}))
            .await
            .unwrap();
        assert!(found);

        let doc = store.get("challenges", &id).await.unwrap().unwrap();
        assert_eq!(doc["status"], "accepted");
        assert_eq!(doc["a"], 1);
    }

    #[tokio::test]
    async fn update_on_missing_document_reports_false() {
        let store = MemoryStore::new();
        let found = store
            .update("challenges", "nope", json!({"status": "accepted"}))
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn delete_reports_whether_the_document_existed() {
        let store = MemoryStore::new();
        let id = store
            .create("challenges", json!({"status": "pending"}), None)
            .await
            .unwrap();

        assert!(store.delete("challenges", &id).await.unwrap());
        assert!(store.get("challenges", &id).await.unwrap().is_none());
        assert!(!store.delete("challenges", &id).await.unwrap());
    }

    #[tokio::test]
    async fn query_multi_unions_without_duplicates() {
        let store = MemoryStore::new();
        store
            .create(
                "challenge_results",
                json!({"from_user": "a", "to_user": "b"}),
                Some("r1".into()),
            )
            .await
            .unwrap();
        store
            .create(
                "challenge_results",
                json!({"from_user": "b", "to_user": "a"}),
                Some("r2".into()),
            )
            .await
            .unwrap();
        store
            .create(
                "challenge_results",
                json!({"from_user": "b", "to_user": "c"}),
                Some("r3".into()),
            )
            .await
            .unwrap();

        let docs = store
            .query_multi(
                "challenge_results",
                vec![Filter::eq("from_user", "a"), Filter::eq("to_user", "a")],
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }
}
