use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified error type for the relay
#[derive(Error, Debug)]
pub enum RelayError {
    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid container id: {0}")]
    InvalidContainerId(String),

    // Upstream bus errors
    #[error("ROS not connected")]
    BusUnavailable,

    #[error("Bus transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Bus connection timed out after {secs}s")]
    ConnectTimeout { secs: u64 },

    // Payload errors
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Frame payload is empty")]
    EmptyFrame,

    // Container shim errors
    #[error("Docker is not available or not installed")]
    ContainerRuntimeUnavailable,

    #[error("Container command `{command}` failed: {stderr}")]
    ContainerCommand { command: String, stderr: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            RelayError::InvalidRequest(_)
            | RelayError::InvalidContainerId(_)
            | RelayError::MalformedPayload(_)
            | RelayError::EmptyFrame
            | RelayError::InvalidConfig(_) => StatusCode::BAD_REQUEST,

            // 502 Bad Gateway
            RelayError::Transport(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            RelayError::BusUnavailable | RelayError::ContainerRuntimeUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 504 Gateway Timeout
            RelayError::ConnectTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            RelayError::ContainerCommand { .. }
            | RelayError::Serialization(_)
            | RelayError::Io(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for RelayError {
    fn from(err: url::ParseError) -> Self {
        RelayError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_code_mapping() {
        assert_eq!(
            RelayError::InvalidRequest("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::InvalidContainerId("-rf".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::BusUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RelayError::ContainerRuntimeUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RelayError::ConnectTimeout { secs: 10 }.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            RelayError::ContainerCommand {
                command: "docker stop abc".to_string(),
                stderr: "no such container".to_string()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_client_server_helpers() {
        assert!(RelayError::InvalidRequest("bad".to_string()).is_client_error());
        assert!(!RelayError::InvalidRequest("bad".to_string()).is_server_error());

        assert!(RelayError::BusUnavailable.is_server_error());
        assert!(!RelayError::BusUnavailable.is_client_error());
    }

    #[tokio::test]
    async fn test_error_response_body() {
        use http_body_util::BodyExt;

        let response = RelayError::BusUnavailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "ROS not connected");
    }
}
