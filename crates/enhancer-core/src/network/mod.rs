//! Network access to the model host.
//!
//! This module provides:
//! - Retry logic with exponential backoff that honours `Retry-After`
//! - The Replicate predictions client implementing [`crate::Upscaler`]

mod replicate;
mod retry;

pub use replicate::{validate_prediction_id, ReplicateClient, DATA_URI_MAX_BYTES};
pub use retry::{retry_async, retry_async_if, RetryConfig, RetryStats};
