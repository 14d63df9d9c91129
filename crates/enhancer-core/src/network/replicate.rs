//! HTTP client for the Replicate predictions API.
//!
//! An enhancement is one prediction:
//! 1. Resolve the image input (URL, inline data URI, or uploaded file)
//! 2. Create the prediction via `POST /predictions`
//! 3. Poll `GET /predictions/{id}` until it reaches a terminal status
//! 4. Cancel it if the deadline passes first

use super::retry::{retry_async_if, RetryConfig};
use crate::config::{NetworkConfig, ReplicateSettings};
use crate::enhance::{ImageSource, Scale};
use crate::upscaler::{Enhancement, OutputStream, Prediction, Upscaler};
use crate::{EnhancerError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Uploads up to this size are inlined as data URIs; larger ones go through the files API.
pub const DATA_URI_MAX_BYTES: usize = 1024 * 1024;

/// Response from `POST /files`.
#[derive(Debug, Deserialize)]
struct FileUpload {
    urls: FileUrls,
}

#[derive(Debug, Deserialize)]
struct FileUrls {
    get: String,
}

/// Reject ids that could escape the `/predictions/{id}` path segment.
pub fn validate_prediction_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(EnhancerError::validation(
            "job_id",
            format!("'{}' is not a valid prediction id", id),
        ))
    }
}

/// Client for a Replicate-compatible predictions API.
pub struct ReplicateClient {
    settings: ReplicateSettings,
    /// Client for API calls.
    client: Client,
    /// Client without a total timeout for relaying output images.
    download_client: Client,
    retry: RetryConfig,
}

impl std::fmt::Debug for ReplicateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicateClient")
            .field("settings", &self.settings)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ReplicateClient {
    pub fn new(settings: ReplicateSettings) -> Result<Self> {
        settings.model_version()?;

        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| EnhancerError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        let download_client = Client::builder()
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| EnhancerError::Network {
                message: format!("Failed to create download client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            settings,
            client,
            download_client,
            retry: RetryConfig::default(),
        })
    }

    /// Replace the retry policy used for prediction creation.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn settings(&self) -> &ReplicateSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.settings.api_token)
    }

    /// Turn an image source into the model's `image` input value.
    async fn model_input(&self, source: &ImageSource) -> Result<String> {
        match source {
            ImageSource::Upload {
                filename,
                content_type,
                bytes,
            } if bytes.len() > DATA_URI_MAX_BYTES => {
                self.upload_file(filename, content_type, bytes.clone()).await
            }
            _ => Ok(source.to_model_input()),
        }
    }

    /// Upload a file through the files API and return its serving URL.
    async fn upload_file(&self, filename: &str, content_type: &str, bytes: Bytes) -> Result<String> {
        let url = self.endpoint("/files");
        debug!("Uploading '{}' ({} bytes) to {}", filename, bytes.len(), url);

        let part = reqwest::multipart::Part::stream(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| EnhancerError::UnsupportedMedia(format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("content", part);

        let response = self
            .authorized(self.client.post(&url).multipart(form))
            .send()
            .await
            .map_err(|e| network_error("POST", &url, e))?;
        let response = check_status(response, None).await?;

        let upload: FileUpload = response.json().await.map_err(|e| EnhancerError::Upstream {
            status: 200,
            message: format!("Failed to parse file upload response: {}", e),
        })?;
        Ok(upload.urls.get)
    }

    /// Create a prediction for the configured model.
    pub async fn create_prediction(&self, input: &str, scale: Scale) -> Result<Prediction> {
        let url = self.endpoint("/predictions");
        let body = json!({
            "version": self.settings.model_version()?,
            "input": {
                "image": input,
                "scale": scale.factor(),
            }
        });

        // Creation is not idempotent: only resend when the request cannot have
        // produced a prediction.
        let (url, body) = (&url, &body);
        let (result, stats) = retry_async_if(
            &self.retry,
            "create prediction",
            EnhancerError::is_safe_to_resend,
            || async move {
                let response = self
                    .authorized(self.client.post(url).json(body))
                    .send()
                    .await
                    .map_err(|e| network_error("POST", url, e))?;
                let response = check_status(response, None).await?;
                parse_prediction(response).await
            },
        )
        .await;

        let prediction = result?;
        info!(
            "Created prediction {} (scale {}, {} attempt(s))",
            prediction.id, scale, stats.attempts
        );
        Ok(prediction)
    }

    /// Fetch the current state of a prediction.
    pub async fn get_prediction(&self, id: &str) -> Result<Prediction> {
        validate_prediction_id(id)?;
        let url = self.endpoint(&format!("/predictions/{}", id));

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| network_error("GET", &url, e))?;
        let response = check_status(response, Some(id)).await?;
        parse_prediction(response).await
    }

    /// Ask the host to stop a prediction.
    pub async fn cancel_prediction(&self, id: &str) -> Result<()> {
        validate_prediction_id(id)?;
        let url = self.endpoint(&format!("/predictions/{}/cancel", id));

        let response = self
            .authorized(self.client.post(&url))
            .send()
            .await
            .map_err(|e| network_error("POST", &url, e))?;
        check_status(response, Some(id)).await?;
        info!("Canceled prediction {}", id);
        Ok(())
    }

    /// Poll a prediction until it is terminal or the configured timeout elapses.
    ///
    /// Transient poll failures are logged and polling continues. Any other
    /// way out of the loop before a terminal status cancels the prediction.
    pub async fn wait_for(&self, mut prediction: Prediction) -> Result<Prediction> {
        let deadline = Instant::now() + self.settings.timeout;

        while !prediction.status.is_terminal() {
            if Instant::now() >= deadline {
                warn!(
                    "Prediction {} still {} after {:?}, canceling",
                    prediction.id, prediction.status, self.settings.timeout
                );
                self.abandon(&prediction.id).await;
                return Err(EnhancerError::Timeout(self.settings.timeout));
            }

            tokio::time::sleep(self.settings.poll_interval).await;
            match self.get_prediction(&prediction.id).await {
                Ok(latest) => {
                    prediction = latest;
                    debug!("Prediction {} is {}", prediction.id, prediction.status);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Polling prediction {} failed, will retry: {}", prediction.id, e);
                }
                Err(e) => {
                    warn!("Polling prediction {} failed: {}", prediction.id, e);
                    self.abandon(&prediction.id).await;
                    return Err(e);
                }
            }
        }

        Ok(prediction)
    }

    /// Best-effort cancel of a prediction we stop waiting for.
    async fn abandon(&self, id: &str) {
        if let Err(e) = self.cancel_prediction(id).await {
            warn!("Failed to cancel prediction {}: {}", id, e);
        }
    }
}

#[async_trait]
impl Upscaler for ReplicateClient {
    async fn enhance(&self, source: &ImageSource, scale: Scale) -> Result<Enhancement> {
        debug!("Enhancing {} at scale {}", source.describe(), scale);

        let input = self.model_input(source).await?;
        let created = self.create_prediction(&input, scale).await?;
        let finished = self.wait_for(created).await?;
        let output_url = finished.finished_output_url()?;

        info!("Prediction {} succeeded", finished.id);
        Ok(Enhancement {
            prediction_id: finished.id,
            output_url,
        })
    }

    async fn prediction(&self, id: &str) -> Result<Prediction> {
        self.get_prediction(id).await
    }

    async fn fetch_output(&self, url: &str) -> Result<OutputStream> {
        let response = self
            .download_client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error("GET", url, e))?;
        let response = check_status(response, None).await?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let content_length = response.content_length();
        let body = response.bytes_stream().map_err(EnhancerError::from).boxed();

        Ok(OutputStream {
            content_type,
            content_length,
            body,
        })
    }
}

fn network_error(method: &str, url: &str, err: reqwest::Error) -> EnhancerError {
    if err.is_timeout() {
        return EnhancerError::Timeout(NetworkConfig::REQUEST_TIMEOUT);
    }
    EnhancerError::Network {
        message: format!("{} {} failed: {}", method, url, err),
        source: Some(err),
    }
}

async fn parse_prediction(response: Response) -> Result<Prediction> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(EnhancerError::from)
}

/// Map a non-success response onto an error, passing successes through.
async fn check_status(response: Response, prediction_id: Option<&str>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        if let Some(id) = prediction_id {
            return Err(EnhancerError::PredictionNotFound { id: id.to_string() });
        }
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        return Err(EnhancerError::RateLimited {
            service: extract_domain(response.url()),
            retry_after_secs: retry_after,
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(EnhancerError::Upstream {
        status: status.as_u16(),
        message: upstream_message(&body, status),
    })
}

/// Prefer the `detail` field of an upstream error body.
fn upstream_message(body: &str, status: StatusCode) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("detail")
            .or_else(|| v.get("title"))
            .and_then(|d| d.as_str())
            .map(String::from)
    });
    match detail {
        Some(detail) => detail,
        None if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        None => body.trim().chars().take(500).collect(),
    }
}

fn extract_domain(url: &reqwest::Url) -> String {
    url.host_str().unwrap_or("unknown").to_string()
}
