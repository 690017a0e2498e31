use serde::Deserialize;
use serde_json::Value;

/// Body of `POST /api/ros/command`
///
/// Fields are loosely typed so that a wrong type is reported as a
/// validation error rather than a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub command: Option<Value>,
}

/// Body of `POST /api/ros/subscribe`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
}

/// Body of `POST /api/ros/unsubscribe`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnsubscribeRequest {
    #[serde(default)]
    pub topic: Option<String>,
}

/// Body of `POST /api/ros/publish`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub message: Option<Value>,
}

/// Body of the container start/stop endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRequest {
    #[serde(default)]
    pub container_id: Option<Value>,
}

/// Query of `GET /api/ros/messages`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    pub since: Option<u64>,
    pub exclude_binary: Option<bool>,
}

/// Query of `GET /api/ros/camera-stream`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamQuery {
    pub since: Option<u64>,
}

/// Returns the trimmed string if `value` is a non-empty string
pub fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requests_accept_camel_case() {
        let req: SubscribeRequest =
            serde_json::from_value(json!({"topic": "/rosout", "messageType": "rcl_interfaces/msg/Log"}))
                .unwrap();
        assert_eq!(req.topic.as_deref(), Some("/rosout"));
        assert_eq!(req.message_type.as_deref(), Some("rcl_interfaces/msg/Log"));

        let req: ContainerRequest = serde_json::from_value(json!({"containerId": "abc"})).unwrap();
        assert_eq!(req.container_id, Some(json!("abc")));
    }

    #[test]
    fn test_non_empty_str() {
        assert_eq!(non_empty_str(Some(&json!(" go "))), Some("go"));
        assert_eq!(non_empty_str(Some(&json!(""))), None);
        assert_eq!(non_empty_str(Some(&json!(42))), None);
        assert_eq!(non_empty_str(None), None);
    }
}
