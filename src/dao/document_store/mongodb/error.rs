use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB document store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The client could not be built from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The initial connection ping never succeeded.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Driver error from the final attempt.
        #[source]
        source: MongoError,
    },
    /// A health-check ping failed on an established connection.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Ensuring an index failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Index key description.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A document write failed.
    #[error("failed to write document `{id}` in `{collection}`")]
    Write {
        /// Collection being written.
        collection: String,
        /// Document id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A document read failed.
    #[error("failed to read document `{id}` from `{collection}`")]
    Read {
        /// Collection being read.
        collection: String,
        /// Document id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A collection query failed.
    #[error("failed to query collection `{collection}`")]
    Query {
        /// Collection being queried.
        collection: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
