use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, Document, doc},
    options::IndexOptions,
};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
};
use crate::dao::{
    document_store::{DocumentStore, Filter, FilterOp},
    storage::StorageResult,
};

/// Document store backed by MongoDB collections of free-form documents.
#[derive(Clone)]
pub struct MongoDocumentStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoDocumentStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Allow the supervisor to re-establish a dropped connection in place.
    pub async fn try_reconnect(&self) -> MongoResult<()> {
        self.inner.reconnect().await
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        for (collection_name, index_name, keys) in [
            ("challenges", "challenge_from_user_idx", doc! {"from_user": 1}),
            ("challenges", "challenge_to_user_idx", doc! {"to_user": 1}),
            (
                "challenge_results",
                "result_participants_idx",
                doc! {"from_user": 1, "to_user": 1},
            ),
        ] {
            let collection = database.collection::<Document>(collection_name);
            let index = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(index_name.to_owned()))
                        .build(),
                )
                .build();

            collection
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: collection_name,
                    index: index_name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection(&self, name: &str) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(name)
    }

    async fn insert(&self, collection: &str, doc: Value, id: Option<String>) -> MongoResult<String> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut document = match json_to_bson(&doc) {
            Bson::Document(document) => document,
            other => doc! {"value": other},
        };
        document.insert("_id", id.clone());
        document.insert("id", id.clone());

        let handle = self.collection(collection).await;
        handle
            .replace_one(doc! {"_id": &id}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: collection.to_owned(),
                id: id.clone(),
                source,
            })?;

        Ok(id)
    }

    async fn fetch(&self, collection: &str, id: &str) -> MongoResult<Option<Value>> {
        let handle = self.collection(collection).await;
        let document = handle
            .find_one(doc! {"_id": id})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: collection.to_owned(),
                id: id.to_owned(),
                source,
            })?;

        Ok(document.map(|doc| document_to_json(&doc)))
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> MongoResult<bool> {
        let set = match json_to_bson(&patch) {
            Bson::Document(document) => document,
            other => doc! {"value": other},
        };

        let handle = self.collection(collection).await;
        let outcome = handle
            .update_one(doc! {"_id": id}, doc! {"$set": set})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: collection.to_owned(),
                id: id.to_owned(),
                source,
            })?;

        Ok(outcome.matched_count > 0)
    }

    async fn remove(&self, collection: &str, id: &str) -> MongoResult<bool> {
        let handle = self.collection(collection).await;
        let outcome = handle
            .delete_one(doc! {"_id": id})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: collection.to_owned(),
                id: id.to_owned(),
                source,
            })?;

        Ok(outcome.deleted_count > 0)
    }

    async fn find(&self, collection: &str, criteria: Document) -> MongoResult<Vec<Value>> {
        let handle = self.collection(collection).await;
        let documents: Vec<Document> = handle
            .find(criteria)
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: collection.to_owned(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: collection.to_owned(),
                source,
            })?;

        Ok(documents.iter().map(document_to_json).collect())
    }
}

impl DocumentStore for MongoDocumentStore {
    fn create(
        &self,
        collection: &str,
        doc: Value,
        id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move { store.insert(&collection, doc, id).await.map_err(Into::into) })
    }

    fn get(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        let id = id.to_owned();
        Box::pin(async move { store.fetch(&collection, &id).await.map_err(Into::into) })
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
        Box::pin(async move { store.merge(&collection, &id, patch).await.map_err(Into::into) })
    }

    fn delete(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let collection = collection.to_owned();
        let id = id.to_owned();
        Box::pin(async move { store.remove(&collection, &id).await.map_err(Into::into) })
    }

    fn query(
        &self,
        collection: &str,
        filter: Filter,
    ) -> BoxFuture<'static, StorageResult<Vec<Value>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move {
            store
                .find(&collection, filter_to_criteria(&filter))
                .await
                .map_err(Into::into)
        })
    }

    fn query_multi(
        &self,
        collection: &str,
        filters: Vec<Filter>,
    ) -> BoxFuture<'static, StorageResult<Vec<Value>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move {
            if filters.is_empty() {
                return Ok(Vec::new());
            }

            let branches: Vec<Bson> = filters
                .iter()
                .map(|filter| Bson::Document(filter_to_criteria(filter)))
                .collect();
            store
                .find(&collection, doc! {"$or": branches})
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }
}

fn filter_to_criteria(filter: &Filter) -> Document {
    let value = json_to_bson(&filter.value);
    let condition = match filter.op {
        FilterOp::Eq => value,
        FilterOp::Ne => Bson::Document(doc! {"$ne": value}),
        FilterOp::Gt => Bson::Document(doc! {"$gt": value}),
        FilterOp::Gte => Bson::Document(doc! {"$gte": value}),
        FilterOp::Lt => Bson::Document(doc! {"$lt": value}),
        FilterOp::Lte => Bson::Document(doc! {"$lte": value}),
    };

    let mut criteria = Document::new();
    criteria.insert(filter.field.clone(), condition);
    criteria
}

fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(flag) => Bson::Boolean(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Bson::Int64(int)
            } else {
                Bson::Double(number.as_f64().unwrap_or_default())
            }
        }
        Value::String(text) => Bson::String(text.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(fields) => {
            let mut document = Document::new();
            for (key, field) in fields {
                document.insert(key.clone(), json_to_bson(field));
            }
            Bson::Document(document)
        }
    }
}

fn bson_to_json(bson: &Bson) -> Value {
    match bson {
        Bson::Null => Value::Null,
        Bson::Boolean(flag) => Value::Bool(*flag),
        Bson::Int32(int) => Value::from(*int),
        Bson::Int64(int) => Value::from(*int),
        Bson::Double(double) => Value::from(*double),
        Bson::String(text) => Value::String(text.clone()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(document) => document_to_json(document),
        other => Value::String(other.to_string()),
    }
}

/// Convert a BSON document to JSON, dropping the backend-private `_id` field.
fn document_to_json(document: &Document) -> Value {
    let mut fields = serde_json::Map::new();
    for (key, value) in document {
        if key == "_id" {
            continue;
        }
        fields.insert(key.clone(), bson_to_json(value));
    }
    Value::Object(fields)
}
