//! rosbridge v2 JSON protocol
//!
//! Every frame is a JSON object discriminated by its `op` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operations the relay sends to rosbridge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BusOp {
    Subscribe {
        topic: String,
        #[serde(rename = "type")]
        kind: String,
        id: String,
    },
    Unsubscribe {
        topic: String,
        id: String,
    },
    Advertise {
        topic: String,
        #[serde(rename = "type")]
        kind: String,
        id: String,
    },
    Publish {
        topic: String,
        msg: Value,
    },
}

impl BusOp {
    pub fn subscribe(topic: &str, kind: &str) -> Self {
        BusOp::Subscribe {
            topic: topic.to_string(),
            kind: kind.to_string(),
            id: operation_id("subscribe", topic),
        }
    }

    pub fn unsubscribe(topic: &str) -> Self {
        BusOp::Unsubscribe {
            topic: topic.to_string(),
            id: operation_id("subscribe", topic),
        }
    }

    pub fn advertise(topic: &str, kind: &str) -> Self {
        BusOp::Advertise {
            topic: topic.to_string(),
            kind: kind.to_string(),
            id: operation_id("advertise", topic),
        }
    }

    pub fn publish(topic: &str, msg: Value) -> Self {
        BusOp::Publish {
            topic: topic.to_string(),
            msg,
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            BusOp::Subscribe { topic, .. }
            | BusOp::Unsubscribe { topic, .. }
            | BusOp::Advertise { topic, .. }
            | BusOp::Publish { topic, .. } => topic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BusOp::Subscribe { .. } => "subscribe",
            BusOp::Unsubscribe { .. } => "unsubscribe",
            BusOp::Advertise { .. } => "advertise",
            BusOp::Publish { .. } => "publish",
        }
    }
}

/// rosbridge pairs unsubscribe with subscribe through the id, so it must be
/// stable per topic.
fn operation_id(kind: &str, topic: &str) -> String {
    format!("{}:{}", kind, topic)
}

/// Frames rosbridge sends to the relay
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BusFrame {
    Publish {
        topic: String,
        #[serde(default)]
        msg: Value,
    },
    Status {
        #[serde(default)]
        level: String,
        #[serde(default)]
        msg: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_serializes_type_field() {
        let op = BusOp::subscribe("/rosout", "rcl_interfaces/msg/Log");
        let value = serde_json::to_value(&op).unwrap();

        assert_eq!(
            value,
            json!({
                "op": "subscribe",
                "topic": "/rosout",
                "type": "rcl_interfaces/msg/Log",
                "id": "subscribe:/rosout"
            })
        );
    }

    #[test]
    fn test_unsubscribe_reuses_subscribe_id() {
        let sub = serde_json::to_value(BusOp::subscribe("/a", "std_msgs/msg/String")).unwrap();
        let unsub = serde_json::to_value(BusOp::unsubscribe("/a")).unwrap();
        assert_eq!(sub["id"], unsub["id"]);
        assert_eq!(unsub["op"], "unsubscribe");
    }

    #[test]
    fn test_publish_serializes_msg() {
        let op = BusOp::publish("/transcription_text", json!({"data": "go"}));
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(
            value,
            json!({"op": "publish", "topic": "/transcription_text", "msg": {"data": "go"}})
        );
        assert_eq!(op.name(), "publish");
        assert_eq!(op.topic(), "/transcription_text");
    }

    #[test]
    fn test_parse_inbound_frames() {
        let frame: BusFrame =
            serde_json::from_str(r#"{"op":"publish","topic":"/chatter","msg":{"data":"hi"}}"#)
                .unwrap();
        assert_eq!(
            frame,
            BusFrame::Publish {
                topic: "/chatter".to_string(),
                msg: json!({"data": "hi"}),
            }
        );

        let status: BusFrame =
            serde_json::from_str(r#"{"op":"status","level":"error","msg":"no such topic"}"#)
                .unwrap();
        assert!(matches!(status, BusFrame::Status { ref level, .. } if level == "error"));

        let other: BusFrame =
            serde_json::from_str(r#"{"op":"service_response","id":"x"}"#).unwrap();
        assert_eq!(other, BusFrame::Other);
    }

    #[test]
    fn test_parse_rejects_frames_without_op() {
        assert!(serde_json::from_str::<BusFrame>(r#"{"topic":"/x"}"#).is_err());
        assert!(serde_json::from_str::<BusFrame>(r#"{"op":"publish"}"#).is_err());
    }
}
