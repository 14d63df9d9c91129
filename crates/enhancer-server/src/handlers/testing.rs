//! In-memory [`Upscaler`] and request helpers for handler tests.

use crate::server::{build_router, AppState};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use enhancer_core::{
    EnhancerError, Enhancement, ImageSource, OutputStream, Prediction, Result, Scale, Upscaler,
};
use futures::stream;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Upscaler that answers from memory.
///
/// Inputs containing `fail` produce an upstream error; everything else succeeds
/// with `https://cdn.test/out/<n>.png`.
#[derive(Default)]
pub struct FakeUpscaler {
    pub calls: Mutex<Vec<(String, u8)>>,
    pub predictions: HashMap<String, Prediction>,
    pub outputs: HashMap<String, (String, Bytes)>,
}

impl FakeUpscaler {
    pub fn with_prediction(mut self, prediction: Value) -> Self {
        let prediction: Prediction = serde_json::from_value(prediction).unwrap();
        self.predictions.insert(prediction.id.clone(), prediction);
        self
    }

    pub fn with_output(mut self, url: &str, content_type: &str, body: &'static [u8]) -> Self {
        self.outputs.insert(
            url.to_string(),
            (content_type.to_string(), Bytes::from_static(body)),
        );
        self
    }

    pub fn recorded(&self) -> Vec<(String, u8)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upscaler for FakeUpscaler {
    async fn enhance(&self, source: &ImageSource, scale: Scale) -> Result<Enhancement> {
        let input = source.to_model_input();
        let mut calls = self.calls.lock().unwrap();
        calls.push((input.clone(), scale.factor()));

        if input.contains("fail") {
            return Err(EnhancerError::Upstream {
                status: 502,
                message: "model host unavailable".into(),
            });
        }
        Ok(Enhancement {
            prediction_id: format!("p{}", calls.len()),
            output_url: format!("https://cdn.test/out/{}.png", calls.len()),
        })
    }

    async fn prediction(&self, id: &str) -> Result<Prediction> {
        self.predictions
            .get(id)
            .cloned()
            .ok_or_else(|| EnhancerError::PredictionNotFound { id: id.to_string() })
    }

    async fn fetch_output(&self, url: &str) -> Result<OutputStream> {
        let (content_type, body) = self.outputs.get(url).cloned().ok_or_else(|| {
            EnhancerError::Upstream {
                status: 404,
                message: "Not Found".into(),
            }
        })?;
        Ok(OutputStream {
            content_type: Some(content_type),
            content_length: Some(body.len() as u64),
            body: Box::pin(stream::iter(vec![Ok(body)])),
        })
    }
}

/// Body limit of routers built by [`router`].
pub const TEST_UPLOAD_LIMIT: usize = 1024 * 1024;

pub fn router(upscaler: Arc<FakeUpscaler>) -> Router {
    build_router(Arc::new(
        AppState::new(upscaler).with_max_upload_bytes(TEST_UPLOAD_LIMIT),
    ))
}

/// Send one request through the router and return status, headers and raw body.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Bytes) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

pub async fn send_json(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
