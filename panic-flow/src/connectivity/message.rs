//! Inbound and outbound payloads exchanged through the connectivity port.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection lifecycle as reported by the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Messages the core sends to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    IntensityUpdate { intensity: f64 },
    UserMessage { text: String },
    EndSession,
}

impl OutboundMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::IntensityUpdate { .. } => "intensity_update",
            Self::UserMessage { .. } => "user_message",
            Self::EndSession => "end_session",
        }
    }
}

/// An outbound message as it leaves the port, stamped with session metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub session_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub message: OutboundMessage,
}

impl Envelope {
    pub fn stamp(session_id: &str, user_id: &str, message: OutboundMessage) -> Self {
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            message,
        }
    }
}

/// Server messages the core understands. Everything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Supportive reply from the backend
    AiResponse { message: String },
    /// Backend detected a crisis and attached resources
    CrisisResources { message: Option<String> },
}

impl ServerMessage {
    /// Parse a raw inbound payload by its `type` discriminator.
    ///
    /// Returns `None` for unknown types and malformed payloads.
    pub fn parse(payload: &Value) -> Option<Self> {
        let kind = payload.get("type")?.as_str()?;
        match kind {
            "ai_response" => Some(Self::AiResponse {
                message: message_text(payload)?,
            }),
            "crisis_resources" => Some(Self::CrisisResources {
                message: message_text(payload),
            }),
            _ => None,
        }
    }
}

/// Text carried by a payload: `message`, `text`, or the same keys under `data`.
fn message_text(payload: &Value) -> Option<String> {
    let lookup = |v: &Value| {
        ["message", "text"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    };
    lookup(payload).or_else(|| payload.get("data").and_then(lookup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ai_response() {
        let msg = ServerMessage::parse(&json!({"type": "ai_response", "message": "I'm here."}));
        assert_eq!(
            msg,
            Some(ServerMessage::AiResponse {
                message: "I'm here.".to_string()
            })
        );

        let nested = ServerMessage::parse(&json!({"type": "ai_response", "data": {"text": "Breathe."}}));
        assert_eq!(
            nested,
            Some(ServerMessage::AiResponse {
                message: "Breathe.".to_string()
            })
        );
    }

    #[test]
    fn test_parse_crisis_resources_without_message() {
        let msg = ServerMessage::parse(&json!({"type": "crisis_resources"}));
        assert_eq!(msg, Some(ServerMessage::CrisisResources { message: None }));
    }

    #[test]
    fn test_unknown_and_malformed_payloads_are_ignored() {
        assert_eq!(ServerMessage::parse(&json!({"type": "typing"})), None);
        assert_eq!(ServerMessage::parse(&json!({"type": 7})), None);
        assert_eq!(ServerMessage::parse(&json!(["ai_response"])), None);
        assert_eq!(ServerMessage::parse(&json!({"type": "ai_response"})), None);
    }

    #[test]
    fn test_envelope_flattens_message() {
        let envelope = Envelope::stamp("s-1", "u-1", OutboundMessage::IntensityUpdate { intensity: 6.5 });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "intensity_update");
        assert_eq!(json["intensity"], 6.5);
        assert_eq!(json["session_id"], "s-1");
        assert_eq!(json["user_id"], "u-1");
        assert!(json.get("timestamp").is_some());
    }
}
