use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Challenge lifecycle requests and responses.
pub mod challenge;
/// Shared payload fragments.
pub mod common;
/// Health endpoint payloads.
pub mod health;
/// Statistics and analytics payloads.
pub mod stats;
/// Custom validation helpers.
pub mod validation;
/// WebSocket event envelopes and payloads.
pub mod ws;

pub(crate) fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

pub(crate) fn format_timestamp_opt(timestamp: Option<OffsetDateTime>) -> Option<String> {
    timestamp.map(format_timestamp)
}
