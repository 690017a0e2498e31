//! CORS middleware configuration
//!
//! Only whitelisted origins are allowed. Without configuration that is the
//! dashboard's dev server on port 5173.

use axum::http::header;
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

const DEFAULT_ORIGINS: [HeaderValue; 2] = [
    HeaderValue::from_static("http://localhost:5173"),
    HeaderValue::from_static("http://127.0.0.1:5173"),
];

/// Create a CORS layer with the specified allowed origins
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = if allowed_origins.is_empty() {
        debug!("CORS: No origins specified, allowing the local dashboard only");
        DEFAULT_ORIGINS.to_vec()
    } else {
        debug!("CORS: Allowing origins: {:?}", allowed_origins);
        allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    warn!(origin = %o, "CORS: Ignoring invalid origin");
                    None
                }
            })
            .collect()
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::CACHE_CONTROL])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    async fn allowed_origin(layer: CorsLayer, origin: &str) -> Option<String> {
        let app = axum::Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(layer);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/")
                    .header("Origin", origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        response
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_cors_empty_origins_allows_dashboard() {
        assert_eq!(
            allowed_origin(cors_layer(&[]), "http://localhost:5173").await,
            Some("http://localhost:5173".to_string())
        );
    }

    #[tokio::test]
    async fn test_cors_empty_origins_blocks_other_origins() {
        assert!(allowed_origin(cors_layer(&[]), "https://example.com")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_cors_with_origins_allows_configured() {
        let origins = vec![
            "https://robot.example.com".to_string(),
            "https://ops.example.com".to_string(),
        ];

        assert_eq!(
            allowed_origin(cors_layer(&origins), "https://ops.example.com").await,
            Some("https://ops.example.com".to_string())
        );
        assert!(allowed_origin(cors_layer(&origins), "http://localhost:5173")
            .await
            .is_none());
    }
}
