use serde_json::Value;

/// How the host answered a config update.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Synced(Value),
    HostError(String),
}

impl SyncOutcome {
    /// Classifies an acknowledgement. Any string `error` field wins,
    /// including the bridge's own `"Host disconnected"` reply.
    pub fn from_ack(ack: Value) -> Self {
        match ack.get("error").and_then(Value::as_str) {
            Some(message) => SyncOutcome::HostError(message.to_string()),
            None => SyncOutcome::Synced(ack),
        }
    }

    /// Text for the popup's error line, if any.
    pub fn user_message(&self) -> Option<String> {
        match self {
            SyncOutcome::Synced(_) => None,
            SyncOutcome::HostError(message) => Some(format!("Host Error: {message}")),
        }
    }
}
