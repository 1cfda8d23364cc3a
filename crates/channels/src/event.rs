use serde::{Deserialize, Serialize};

/// A free-text message received from the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Opaque identifier of the sender; replies go back to it.
    pub sender_id: String,
    pub text: String,
    /// Transport-specific payload, carried through untouched.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl InboundEvent {
    pub fn new(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            text: text.into(),
            raw: serde_json::Value::Null,
        }
    }
}
