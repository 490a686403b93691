//! Backend-agnostic document persistence.
//!
//! The core logic only ever sees this trait: keyed JSON documents grouped in
//! named collections, with single-field predicates and an OR-union multi
//! query. No transactions and no atomic increments are exposed; aggregate
//! callers are expected to serialize their own read-modify-write cycles.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::dao::storage::StorageResult;

/// Comparison operator usable in a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field equals the value.
    Eq,
    /// Field differs from the value.
    Ne,
    /// Field is strictly greater than the value.
    Gt,
    /// Field is greater than or equal to the value.
    Gte,
    /// Field is strictly less than the value.
    Lt,
    /// Field is less than or equal to the value.
    Lte,
}

/// Single-field predicate applied to top-level document fields.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Top-level field the predicate applies to.
    pub field: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Value the field is compared against.
    pub value: Value,
}

impl Filter {
    /// Build an equality predicate.
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_owned(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Build a strictly-greater-than predicate.
    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_owned(),
            op: FilterOp::Gt,
            value: value.into(),
        }
    }

    /// Evaluate this predicate against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        let Some(field) = doc.get(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => field == &self.value,
            FilterOp::Ne => field != &self.value,
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let Some(ordering) = compare_values(field, &self.value) else {
                    return false;
                };
                match self.op {
                    FilterOp::Gt => ordering.is_gt(),
                    FilterOp::Gte => ordering.is_ge(),
                    FilterOp::Lt => ordering.is_lt(),
                    FilterOp::Lte => ordering.is_le(),
                    _ => unreachable!(),
                }
            }
        }
    }
}

/// Order two JSON scalars when they are comparable (numbers or strings).
fn compare_values(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// Abstraction over the persistence layer for challenges and aggregates.
///
/// Stored documents are JSON objects; every document carries its own `id`
/// field, injected by the backend. `update` merges top-level fields into the
/// existing document and reports whether the document existed.
pub trait DocumentStore: Send + Sync {
    /// Insert a document, generating an id when none is supplied. Returns the id.
    fn create(
        &self,
        collection: &str,
        doc: Value,
        id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<String>>;
    /// Fetch a document by id.
    fn get(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<Option<Value>>>;
    /// Merge `patch`'s top-level fields into an existing document.
    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete a document by id, reporting whether it existed.
    fn delete(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// Return every document matching a single-field predicate.
    fn query(
        &self,
        collection: &str,
        filter: Filter,
    ) -> BoxFuture<'static, StorageResult<Vec<Value>>>;
    /// Return the union of documents matching any of the predicates,
    /// deduplicated by document id.
    fn query_multi(
        &self,
        collection: &str,
        filters: Vec<Filter>,
    ) -> BoxFuture<'static, StorageResult<Vec<Value>>>;
    /// Cheap backend liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_filter_matches_exact_field() {
        let doc = json!({"from_user": "alice", "status": "pending"});
        assert!(Filter::eq("from_user", "alice").matches(&doc));
        assert!(!Filter::eq("from_user", "bob").matches(&doc));
        assert!(!Filter::eq("missing", "alice").matches(&doc));
    }

    #[test]
    fn numeric_comparisons_respect_ordering() {
        let doc = json!({"times_selected": 3});
        assert!(Filter::gt("times_selected", 0).matches(&doc));
        assert!(!Filter::gt("times_selected", 3).matches(&doc));

        let gte = Filter {
            field: "times_selected".into(),
            op: FilterOp::Gte,
            value: json!(3),
        };
        assert!(gte.matches(&doc));
    }

    #[test]
    fn mismatched_types_never_match_ordered_ops() {
        let doc = json!({"status": "pending"});
        assert!(!Filter::gt("status", 1).matches(&doc));
    }
}
