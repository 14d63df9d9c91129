//! Error types for the image enhancer.
//!
//! Every failure surfaced to an API caller passes through [`EnhancerError`],
//! which also knows the HTTP status it should be reported with.

use crate::config::NetworkConfig;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the enhancer.
#[derive(Debug, Error)]
pub enum EnhancerError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Caller input errors
    #[error("{message}")]
    InvalidParams { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    UnsupportedMedia(String),

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    // Prediction lifecycle errors
    #[error("Prediction {id} failed: {message}")]
    PredictionFailed { id: String, message: String },

    #[error("Prediction {id} was canceled")]
    PredictionCanceled { id: String },

    #[error("Prediction not found: {id}")]
    PredictionNotFound { id: String },

    #[error("Prediction {id} is not finished (status: {status})")]
    PredictionPending { id: String, status: String },

    #[error("Prediction {id} returned no output")]
    MissingOutput { id: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for enhancer operations.
pub type Result<T> = std::result::Result<T, EnhancerError>;

impl From<serde_json::Error> for EnhancerError {
    fn from(err: serde_json::Error) -> Self {
        EnhancerError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for EnhancerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EnhancerError::Timeout(NetworkConfig::REQUEST_TIMEOUT)
        } else {
            EnhancerError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl EnhancerError {
    /// Shorthand for a `Validation` error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EnhancerError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an `InvalidParams` error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        EnhancerError::InvalidParams {
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with.
    ///
    /// - 400: rejected parameters (scale, batch size, non-image upload)
    /// - 404: unknown prediction
    /// - 409: prediction still running
    /// - 422: malformed request body or URL
    /// - 500: everything else, including upstream failures
    pub fn status_code(&self) -> StatusCode {
        match self {
            EnhancerError::InvalidParams { .. } | EnhancerError::UnsupportedMedia(_) => {
                StatusCode::BAD_REQUEST
            }

            EnhancerError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            EnhancerError::PredictionNotFound { .. } => StatusCode::NOT_FOUND,

            EnhancerError::PredictionPending { .. } => StatusCode::CONFLICT,

            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller sent something wrong, as opposed to a backend failure.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            EnhancerError::Network { .. }
            | EnhancerError::Timeout(_)
            | EnhancerError::RateLimited { .. } => true,
            EnhancerError::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether a non-idempotent request can be sent again after this error.
    ///
    /// Only failures where the host never acted on the request qualify: the
    /// connection was never made, or the host answered 429 or 503.
    pub fn is_safe_to_resend(&self) -> bool {
        match self {
            EnhancerError::RateLimited { .. } => true,
            EnhancerError::Upstream { status, .. } => *status == 429 || *status == 503,
            EnhancerError::Network {
                source: Some(source),
                ..
            } => source.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_params_display_is_bare_message() {
        let err = EnhancerError::invalid_params("Scale must be 2, 4, or 8");
        assert_eq!(err.to_string(), "Scale must be 2, 4, or 8");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            EnhancerError::invalid_params("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EnhancerError::validation("image_url", "not a URL").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            EnhancerError::PredictionNotFound { id: "abc".into() }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EnhancerError::PredictionPending {
                id: "abc".into(),
                status: "processing".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            EnhancerError::Upstream {
                status: 502,
                message: "bad gateway".into()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(EnhancerError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(EnhancerError::Upstream {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(EnhancerError::Upstream {
            status: 429,
            message: String::new()
        }
        .is_retryable());
        assert!(!EnhancerError::Upstream {
            status: 401,
            message: String::new()
        }
        .is_retryable());
        assert!(!EnhancerError::invalid_params("nope").is_retryable());
    }

    #[test]
    fn test_resend_is_narrower_than_retry() {
        let timeout = EnhancerError::Timeout(Duration::from_secs(5));
        assert!(timeout.is_retryable());
        assert!(!timeout.is_safe_to_resend());

        let gateway = EnhancerError::Upstream {
            status: 502,
            message: String::new(),
        };
        assert!(gateway.is_retryable());
        assert!(!gateway.is_safe_to_resend());

        assert!(EnhancerError::Upstream {
            status: 503,
            message: String::new()
        }
        .is_safe_to_resend());
        assert!(EnhancerError::RateLimited {
            service: "api.replicate.com".into(),
            retry_after_secs: None
        }
        .is_safe_to_resend());
        assert!(!EnhancerError::Network {
            message: "reset".into(),
            source: None
        }
        .is_safe_to_resend());
    }

    #[tokio::test]
    async fn test_connection_refused_is_safe_to_resend() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = reqwest::get(format!("http://127.0.0.1:{}/", port))
            .await
            .unwrap_err();

        assert!(EnhancerError::from(err).is_safe_to_resend());
    }

    #[tokio::test]
    async fn test_reqwest_timeout_reports_request_timeout() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/slow");
                then.status(200).delay(Duration::from_millis(500));
            })
            .await;

        let err = reqwest::Client::builder()
            .timeout(Duration::from_millis(20))
            .build()
            .unwrap()
            .get(server.url("/slow"))
            .send()
            .await
            .unwrap_err();

        let err = EnhancerError::from(err);
        assert!(
            matches!(err, EnhancerError::Timeout(d) if d == NetworkConfig::REQUEST_TIMEOUT),
            "unexpected error: {err}"
        );
        assert_ne!(err.to_string(), "Request timeout after 0ns");
    }
}
