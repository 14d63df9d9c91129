//! Batch enhancement endpoint.

use super::{ApiError, ApiJson};
use crate::server::AppState;
use axum::extract::{Query, State};
use axum::Json;
use enhancer_core::config::ServiceConfig;
use enhancer_core::{BatchResponse, EnhancerError, ImageSource, ImageUrl, Scale};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct BatchParams {
    scale: Option<String>,
}

/// `POST /enhance-batch?scale=N` with a JSON array of image URLs.
///
/// Images are processed one after another in request order. A failure on one
/// image is recorded and the rest still run.
pub async fn enhance_batch(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BatchParams>,
    ApiJson(raw_urls): ApiJson<Vec<String>>,
) -> Result<Json<BatchResponse>, ApiError> {
    let urls = raw_urls
        .iter()
        .map(|raw| ImageUrl::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    if urls.len() > ServiceConfig::MAX_BATCH_SIZE {
        return Err(EnhancerError::invalid_params(format!(
            "Batch size limited to {} images",
            ServiceConfig::MAX_BATCH_SIZE
        ))
        .into());
    }

    let scale = match params.scale.as_deref() {
        Some(raw) => Scale::parse(raw)?,
        None => Scale::default(),
    };

    info!("Enhancing batch of {} images at scale {}", urls.len(), scale);
    let mut response = BatchResponse::new(scale);

    for (index, url) in urls.iter().enumerate() {
        match state
            .upscaler
            .enhance(&ImageSource::Url(url.clone()), scale)
            .await
        {
            Ok(result) => response.push_success(index, url, result.output_url),
            Err(e) => {
                warn!("Batch item {} ({}) failed: {}", index, url, e);
                response.push_failure(index, url, e.to_string());
            }
        }
    }

    info!(
        "Batch finished: {} succeeded, {} failed",
        response.total_processed, response.total_failed
    );
    Ok(Json(response))
}
