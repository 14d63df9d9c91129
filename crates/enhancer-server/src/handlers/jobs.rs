//! Prediction lookup and output download.

use super::ApiError;
use crate::server::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use enhancer_core::network::validate_prediction_id;
use enhancer_core::PredictionStatusResponse;
use std::sync::Arc;
use tracing::{debug, info};

/// `GET /status/{job_id}`
pub async fn prediction_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<PredictionStatusResponse>, ApiError> {
    validate_prediction_id(&job_id)?;

    let prediction = state
        .upscaler
        .prediction(&job_id)
        .await
        .map_err(|e| ApiError::with_context("Status check failed", e))?;

    debug!("Prediction {} is {}", prediction.id, prediction.status);
    Ok(Json(PredictionStatusResponse::from(&prediction)))
}

/// `GET /download/{image_id}`: relay the enhanced image of a finished prediction.
pub async fn download_image(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<String>,
) -> Result<Response, ApiError> {
    const CONTEXT: &str = "Download failed";
    validate_prediction_id(&image_id)?;

    let prediction = state
        .upscaler
        .prediction(&image_id)
        .await
        .map_err(|e| ApiError::with_context(CONTEXT, e))?;
    let output_url = prediction
        .finished_output_url()
        .map_err(|e| ApiError::with_context(CONTEXT, e))?;

    let output = state
        .upscaler
        .fetch_output(&output_url)
        .await
        .map_err(|e| ApiError::with_context(CONTEXT, e))?;
    info!("Relaying output of prediction {}", image_id);

    let content_type = output
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    let disposition = format!(
        "attachment; filename=\"{}\"",
        output_filename(&image_id, &output_url)
    );

    let mut response = Body::from_stream(output.body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(len) = output.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// `<id>.<ext>`, taking the extension from the output URL when it has a sane one.
fn output_filename(id: &str, output_url: &str) -> String {
    let extension = url::Url::parse(output_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(String::from))
        })
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}
