//! MediUX WebSocket message types and parser.
//!
//! Frames are JSON objects tagged by `type`. Subscription frames carry a
//! second tag, `event`, and the changed records under `data`.

use serde::{Deserialize, Serialize};

/// Collection whose changes are pushed to us.
pub const SUBSCRIBED_COLLECTION: &str = "show_sets";

/// Messages this client understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediuxMessage {
    /// Keepalive; must be answered with [`OutgoingMessage::Pong`].
    Ping,
    /// Initial snapshot after subscribing. Carries nothing we act on.
    Init,
    /// One or more sets changed.
    Update { set_ids: Vec<String> },
}

/// Frames we send.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Subscribe { collection: &'static str },
    Pong,
}

impl OutgoingMessage {
    pub fn subscribe() -> Self {
        OutgoingMessage::Subscribe {
            collection: SUBSCRIBED_COLLECTION,
        }
    }

    pub fn to_json(&self) -> String {
        // Serialising these variants cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown message type '{kind}' (event: {event:?})")]
    Unknown { kind: String, event: Option<String> },
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    id: RawId,
}

/// Set ids arrive as numbers or strings depending on the collection.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Int(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

/// Parse a text frame. Unknown types and events are errors; callers log
/// them and keep reading.
pub fn parse_message(text: &str) -> Result<MediuxMessage, MessageError> {
    let raw: RawMessage = serde_json::from_str(text)?;
    match (raw.kind.as_str(), raw.event.as_deref()) {
        ("ping", _) => Ok(MediuxMessage::Ping),
        ("subscription", Some("init")) => Ok(MediuxMessage::Init),
        ("subscription", Some("update")) => Ok(MediuxMessage::Update {
            set_ids: raw.data.into_iter().map(|r| r.id.into_string()).collect(),
        }),
        _ => Err(MessageError::Unknown {
            kind: raw.kind,
            event: raw.event,
        }),
    }
}
