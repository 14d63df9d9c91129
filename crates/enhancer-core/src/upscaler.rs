//! The model backend seam.
//!
//! Handlers only see [`Upscaler`]. [`crate::ReplicateClient`] is the production
//! implementation; tests substitute their own.

use crate::enhance::{ImageSource, Scale};
use crate::{EnhancerError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle state of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
            PredictionStatus::Unknown => "unknown",
        }
    }

    /// Whether the prediction has stopped changing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prediction as reported by the model host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Prediction {
    /// First URL in the output, whether it is a single string or a list.
    pub fn output_url(&self) -> Option<String> {
        match self.output.as_ref()? {
            Value::String(url) => Some(url.clone()),
            Value::Array(items) => items.iter().find_map(|v| v.as_str().map(String::from)),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(message) => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Output URL of a finished prediction, or the error describing why there is none.
    pub fn finished_output_url(&self) -> Result<String> {
        match self.status {
            PredictionStatus::Succeeded => {
                self.output_url().ok_or_else(|| EnhancerError::MissingOutput {
                    id: self.id.clone(),
                })
            }
            PredictionStatus::Failed => Err(EnhancerError::PredictionFailed {
                id: self.id.clone(),
                message: self
                    .error_message()
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
            PredictionStatus::Canceled => Err(EnhancerError::PredictionCanceled {
                id: self.id.clone(),
            }),
            status => Err(EnhancerError::PredictionPending {
                id: self.id.clone(),
                status: status.to_string(),
            }),
        }
    }
}

/// Result of a completed enhancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enhancement {
    pub prediction_id: String,
    pub output_url: String,
}

/// Body of an enhanced image being relayed to the caller.
pub struct OutputStream {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Something that can upscale images and report on past predictions.
#[async_trait]
pub trait Upscaler: Send + Sync {
    /// Run the model on one image and wait for its output URL.
    async fn enhance(&self, source: &ImageSource, scale: Scale) -> Result<Enhancement>;

    /// Look up a prediction by id.
    async fn prediction(&self, id: &str) -> Result<Prediction>;

    /// Open the body behind an output URL.
    async fn fetch_output(&self, url: &str) -> Result<OutputStream>;
}
