use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Messages accepted from connected game clients.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ClientInboundMessage {
    /// Liveness probe; answered with a `pong` event.
    #[serde(rename = "ping")]
    Ping,
    /// Anything else is tolerated and ignored.
    #[serde(other)]
    Unknown,
}

/// Envelope for every event pushed to clients: `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventEnvelope {
    /// Event discriminator, e.g. `challenge.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    #[schema(value_type = Object)]
    pub data: Value,
}

impl EventEnvelope {
    /// Build an envelope from any serializable payload.
    ///
    /// Serialization of our own payload types cannot fail; a `null` data
    /// field is the safe degradation if it ever does.
    pub fn new(event_type: &str, data: impl Serialize) -> Self {
        Self {
            event_type: event_type.to_owned(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }
}

/// Notification that the other participant submitted their number.
///
/// Deliberately omits the number itself so the counterpart cannot adapt
/// their own pick.
#[derive(Debug, Serialize, ToSchema)]
pub struct NumberSubmittedEvent {
    /// Owning challenge.
    pub challenge_id: String,
    /// Participant who submitted.
    pub submitted_by: String,
    /// Challenge status after the submission.
    pub status: crate::state::lifecycle::ChallengeStatus,
}
