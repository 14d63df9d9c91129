//! Enhancer Core - domain types and model backend for the image enhancer API.
//!
//! This crate owns everything below the HTTP surface: request validation,
//! the error model, and the [`Upscaler`] seam with its Replicate-backed
//! implementation. The `enhancer-server` crate wires it into an axum router.
//!
//! # Example
//!
//! ```rust,ignore
//! use enhancer_core::{ImageSource, ImageUrl, ReplicateClient, ReplicateSettings, Scale, Upscaler};
//!
//! #[tokio::main]
//! async fn main() -> enhancer_core::Result<()> {
//!     let client = ReplicateClient::new(ReplicateSettings::from_env()?)?;
//!     let url = ImageUrl::parse("https://example.com/cat.png")?;
//!     let result = client.enhance(&ImageSource::Url(url), Scale::X4).await?;
//!     println!("Enhanced image at {}", result.output_url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod enhance;
pub mod error;
pub mod network;
pub mod upscaler;

pub use config::{NetworkConfig, ReplicateSettings, ServiceConfig};
pub use enhance::{
    BatchFailure, BatchResponse, BatchSuccess, EnhanceFileResponse, EnhanceUrlRequest,
    EnhanceUrlResponse, ImageSource, ImageUrl, PredictionStatusResponse, Scale,
};
pub use error::{EnhancerError, Result};
pub use network::{ReplicateClient, RetryConfig};
pub use upscaler::{Enhancement, OutputStream, Prediction, PredictionStatus, Upscaler};
