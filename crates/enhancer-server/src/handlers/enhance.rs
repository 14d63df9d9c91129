//! Single-image enhancement endpoints.

use super::{ApiError, ApiJson};
use crate::server::AppState;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use enhancer_core::enhance::SUCCESS_STATUS;
use enhancer_core::{
    EnhanceFileResponse, EnhanceUrlRequest, EnhanceUrlResponse, ImageSource, Scale,
};
use std::sync::Arc;
use tracing::{debug, info};

const FAILURE_CONTEXT: &str = "Enhancement failed";

/// `POST /enhance-from-url`
pub async fn enhance_from_url(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<EnhanceUrlRequest>,
) -> Result<Json<EnhanceUrlResponse>, ApiError> {
    let (url, scale) = request.validate()?;
    info!("Enhancing {} at scale {}", url, scale);

    let result = state
        .upscaler
        .enhance(&ImageSource::Url(url.clone()), scale)
        .await
        .map_err(|e| ApiError::with_context(FAILURE_CONTEXT, e))?;

    Ok(Json(EnhanceUrlResponse {
        enhanced_image_url: result.output_url,
        original_image_url: url.to_string(),
        scale: scale.factor(),
        status: SUCCESS_STATUS.to_string(),
    }))
}

/// Fields collected from the multipart form.
#[derive(Default)]
struct UploadForm {
    file: Option<(String, Option<String>, Bytes)>,
    scale: Option<String>,
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Upload exceeds the {} byte limit", limit),
        )
    } else {
        ApiError::new(err.status(), err.body_text())
    }
}

async fn read_form(mut multipart: Multipart, limit: usize) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, limit))?;
                form.file = Some((filename, content_type, bytes));
            }
            Some("scale") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, limit))?;
                form.scale = Some(text);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    Ok(form)
}

/// `POST /enhance-from-file`
pub async fn enhance_from_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EnhanceFileResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    let form = read_form(multipart, state.max_upload_bytes).await?;

    let (filename, content_type, bytes) = form.file.ok_or_else(|| {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "Field required: file")
    })?;

    // Content type is checked before the scale.
    let source = ImageSource::upload(filename.clone(), content_type.as_deref(), bytes)?;
    let scale = match form.scale.as_deref() {
        Some(raw) => Scale::parse(raw)?,
        None => Scale::default(),
    };
    info!("Enhancing {} at scale {}", source.describe(), scale);

    let result = state
        .upscaler
        .enhance(&source, scale)
        .await
        .map_err(|e| ApiError::with_context(FAILURE_CONTEXT, e))?;

    Ok(Json(EnhanceFileResponse {
        enhanced_image_url: result.output_url,
        original_filename: filename,
        scale: scale.factor(),
        status: SUCCESS_STATUS.to_string(),
    }))
}
