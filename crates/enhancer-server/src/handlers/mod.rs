//! HTTP request handlers, split by domain.

mod batch;
mod enhance;
mod jobs;
#[cfg(test)]
pub(crate) mod testing;

pub use batch::enhance_batch;
pub use enhance::{enhance_from_file, enhance_from_url};
pub use jobs::{download_image, prediction_status};

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use enhancer_core::config::ServiceConfig;
use enhancer_core::EnhancerError;
use serde_json::json;
use tracing::{error, warn};

// ============================================================================
// Error responses
// ============================================================================

/// Error reported to the caller as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Report `err`, prefixing backend failures with `context`.
    ///
    /// Caller mistakes keep their bare message.
    pub fn with_context(context: &str, err: EnhancerError) -> Self {
        if err.is_client_error() {
            warn!("Rejected request: {}", err);
            Self::from(err)
        } else {
            error!("{}: {}", context, err);
            Self::new(err.status_code(), format!("{}: {}", context, err))
        }
    }
}

impl From<EnhancerError> for ApiError {
    fn from(err: EnhancerError) -> Self {
        Self::new(err.status_code(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// JSON body extractor whose rejections use the `detail` error shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

// ============================================================================
// Service endpoints
// ============================================================================

/// Landing endpoint.
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": ServiceConfig::ROOT_MESSAGE }))
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": ServiceConfig::SERVICE_NAME }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_api_error_shape() {
        let response = ApiError::new(StatusCode::BAD_REQUEST, "Scale must be 2, 4, or 8")
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"detail": "Scale must be 2, 4, or 8"})
        );
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin() {
        use super::testing::{router, send, FakeUpscaler};
        use axum::body::Body;
        use axum::http::Request;
        use std::sync::Arc;

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/enhance-from-url")
            .header("origin", "https://app.example.com")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(router(Arc::new(FakeUpscaler::default())), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "*");
        assert_eq!(headers["access-control-allow-headers"], "*");
    }

    #[tokio::test]
    async fn test_oversized_json_body_is_413() {
        use super::testing::{json_request, router, send, FakeUpscaler, TEST_UPLOAD_LIMIT};
        use std::sync::Arc;

        let padding = "a".repeat(TEST_UPLOAD_LIMIT + 1);
        let request = json_request(
            "POST",
            "/enhance-from-url",
            json!({"image_url": format!("https://example.com/{}.png", padding)}),
        );
        let (status, _, _) = send(router(Arc::new(FakeUpscaler::default())), request).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_context_only_for_backend_errors() {
        let client = ApiError::with_context(
            "Enhancement failed",
            EnhancerError::invalid_params("Scale must be 2, 4, or 8"),
        );
        assert_eq!(client.status, StatusCode::BAD_REQUEST);
        assert_eq!(client.detail, "Scale must be 2, 4, or 8");

        let backend = ApiError::with_context(
            "Enhancement failed",
            EnhancerError::Other("model crashed".into()),
        );
        assert_eq!(backend.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(backend.detail, "Enhancement failed: model crashed");
    }
}
