use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or the call failed outright.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored document does not deserialize into the expected entity shape.
    #[error("corrupted document `{id}` in collection `{collection}`")]
    Corrupted {
        /// Collection the document was read from.
        collection: String,
        /// Identifier of the offending document.
        id: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a corrupted-document error for a failed entity decode.
    pub fn corrupted(collection: &str, id: &str, source: serde_json::Error) -> Self {
        StorageError::Corrupted {
            collection: collection.to_owned(),
            id: id.to_owned(),
            source,
        }
    }
}
