use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One observed or locally published bus message
///
/// Serialized as `{topic, message, timestamp}` for log clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub topic: String,
    #[serde(rename = "message")]
    pub payload: Value,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Message kind, when known
    #[serde(
        rename = "messageType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
}

impl MessageEnvelope {
    pub fn new(topic: impl Into<String>, payload: Value, timestamp: u64) -> Self {
        Self {
            topic: topic.into(),
            payload,
            timestamp,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Whether the payload carries raw binary data (image bytes and the like)
    pub fn is_binary(&self) -> bool {
        let image_kind = self
            .kind
            .as_deref()
            .map(|k| k.ends_with("/Image") || k.ends_with("/CompressedImage"))
            .unwrap_or(false);

        image_kind || matches!(self.payload.get("data"), Some(Value::Array(_)))
    }
}

/// A camera frame as pushed to stream clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraFrame {
    /// Base64-encoded frame bytes
    pub data: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

/// Result of a poll query
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<MessageEnvelope>,
    pub latest_timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_format() {
        let envelope = MessageEnvelope::new("/rosout", json!({"msg": "ready"}), 42);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            json!({"topic": "/rosout", "message": {"msg": "ready"}, "timestamp": 42})
        );

        let typed = envelope.with_kind("rcl_interfaces/msg/Log");
        let value = serde_json::to_value(&typed).unwrap();
        assert_eq!(value["messageType"], "rcl_interfaces/msg/Log");
    }

    #[test]
    fn test_envelope_binary_detection() {
        let text = MessageEnvelope::new("/chatter", json!({"data": "hello"}), 1)
            .with_kind("std_msgs/msg/String");
        assert!(!text.is_binary());

        let raw = MessageEnvelope::new("/raw", json!({"data": [1, 2, 3]}), 2);
        assert!(raw.is_binary());

        let image = MessageEnvelope::new("/cam", json!({"format": "jpeg", "data": "AAEC"}), 3)
            .with_kind("sensor_msgs/msg/CompressedImage");
        assert!(image.is_binary());
    }
}
