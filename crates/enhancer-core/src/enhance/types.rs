//! Request and response payloads of the HTTP API.

use super::{ImageUrl, Scale};
use crate::config::ServiceConfig;
use crate::upscaler::Prediction;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SUCCESS_STATUS: &str = "success";
pub const FAILED_STATUS: &str = "failed";

fn default_scale() -> Value {
    Value::from(ServiceConfig::DEFAULT_SCALE)
}

/// Body of `POST /enhance-from-url`.
///
/// Fields are kept raw so that a bad scale (400) and a bad URL (422) can be
/// told apart after deserialization. `scale` also accepts `"4"` and `4.0`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnhanceUrlRequest {
    pub image_url: String,
    #[serde(default = "default_scale")]
    pub scale: Value,
}

impl EnhanceUrlRequest {
    /// Validate the URL and scale. The URL is checked first.
    pub fn validate(&self) -> Result<(ImageUrl, Scale)> {
        let url = ImageUrl::parse(&self.image_url)?;
        let scale = Scale::from_json(&self.scale)?;
        Ok((url, scale))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhanceUrlResponse {
    pub enhanced_image_url: String,
    pub original_image_url: String,
    pub scale: u8,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhanceFileResponse {
    pub enhanced_image_url: String,
    pub original_filename: String,
    pub scale: u8,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSuccess {
    pub index: usize,
    pub original_url: String,
    pub enhanced_url: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub original_url: String,
    pub error: String,
    pub status: String,
}

/// Outcome of `POST /enhance-batch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchSuccess>,
    pub errors: Vec<BatchFailure>,
    pub total_processed: usize,
    pub total_failed: usize,
    pub scale: u8,
}

impl BatchResponse {
    pub fn new(scale: Scale) -> Self {
        Self {
            results: Vec::new(),
            errors: Vec::new(),
            total_processed: 0,
            total_failed: 0,
            scale: scale.factor(),
        }
    }

    pub fn push_success(&mut self, index: usize, original: &ImageUrl, enhanced_url: String) {
        self.results.push(BatchSuccess {
            index,
            original_url: original.to_string(),
            enhanced_url,
            status: SUCCESS_STATUS.to_string(),
        });
        self.total_processed = self.results.len();
    }

    pub fn push_failure(&mut self, index: usize, original: &ImageUrl, error: String) {
        self.errors.push(BatchFailure {
            index,
            original_url: original.to_string(),
            error,
            status: FAILED_STATUS.to_string(),
        });
        self.total_failed = self.errors.len();
    }
}

/// Outcome of `GET /status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionStatusResponse {
    pub id: String,
    pub status: String,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Prediction> for PredictionStatusResponse {
    fn from(prediction: &Prediction) -> Self {
        Self {
            id: prediction.id.clone(),
            status: prediction.status.as_str().to_string(),
            output: prediction.output.clone(),
            error: prediction.error_message(),
            created_at: prediction.created_at,
            completed_at: prediction.completed_at,
        }
    }
}
