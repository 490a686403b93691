use serde::Serialize;
use utoipa::ToSchema;

/// Overall service condition reported by `/healthcheck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Storage is installed and the service accepts writes.
    Ok,
    /// No storage backend is available; mutating calls fail with 503.
    Degraded,
}

/// Payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service condition.
    pub status: HealthStatus,
    /// Whether the document store answered the liveness probe.
    pub storage_reachable: bool,
}
