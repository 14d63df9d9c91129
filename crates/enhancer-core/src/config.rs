//! Centralized configuration for the enhancer.
//!
//! Fixed values live in constant groups. Values that differ per deployment
//! are read from the environment into [`ReplicateSettings`].

use crate::{EnhancerError, Result};
use std::fmt;
use std::time::Duration;

/// Service-level configuration.
pub struct ServiceConfig;

impl ServiceConfig {
    pub const SERVICE_NAME: &'static str = "AI Image Enhancer";
    pub const ROOT_MESSAGE: &'static str = "AI Image Enhancer API is running!";
    pub const DEFAULT_HOST: &'static str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 8000;
    pub const ALLOWED_SCALES: [u8; 3] = [2, 4, 8];
    pub const DEFAULT_SCALE: u8 = 2;
    pub const MAX_BATCH_SIZE: usize = 10;
    pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const USER_AGENT: &'static str = concat!("enhancer/", env!("CARGO_PKG_VERSION"));
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const HEALTHCHECK_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CREATE_MAX_ATTEMPTS: u32 = 3;
    pub const REPLICATE_API_BASE: &'static str = "https://api.replicate.com/v1";
    pub const DEFAULT_MODEL: &'static str = "nightmareai/real-esrgan:f121d640bd286e1fdc67f9799164c1d5be36ff74576ee11c803ae5b665dd46aa";
    pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);
    pub const PREDICTION_TIMEOUT: Duration = Duration::from_secs(300);
}

/// Environment variable names.
pub mod env_vars {
    pub const API_TOKEN: &str = "REPLICATE_API_TOKEN";
    pub const API_BASE: &str = "REPLICATE_API_BASE";
    pub const MODEL: &str = "REPLICATE_MODEL";
    pub const POLL_INTERVAL_MS: &str = "REPLICATE_POLL_INTERVAL_MS";
    pub const TIMEOUT_SECS: &str = "REPLICATE_TIMEOUT_SECS";
}

/// Settings for talking to the Replicate predictions API.
#[derive(Clone)]
pub struct ReplicateSettings {
    pub api_token: String,
    pub api_base: String,
    /// Full model reference, `owner/name:version`.
    pub model: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl fmt::Debug for ReplicateSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicateSettings")
            .field("api_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ReplicateSettings {
    /// Settings with defaults for everything but the token.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            api_base: NetworkConfig::REPLICATE_API_BASE.to_string(),
            model: NetworkConfig::DEFAULT_MODEL.to_string(),
            poll_interval: NetworkConfig::POLL_INTERVAL,
            timeout: NetworkConfig::PREDICTION_TIMEOUT,
        }
    }

    /// Override the API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the model reference.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the per-prediction timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup(env_vars::API_TOKEN)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EnhancerError::Config {
                message: format!("{} environment variable is required", env_vars::API_TOKEN),
            })?;

        let mut settings = Self::new(token);

        if let Some(base) = lookup(env_vars::API_BASE).filter(|v| !v.is_empty()) {
            settings = settings.with_api_base(base);
        }
        if let Some(model) = lookup(env_vars::MODEL).filter(|v| !v.is_empty()) {
            settings = settings.with_model(model);
        }
        if let Some(ms) = lookup(env_vars::POLL_INTERVAL_MS) {
            let ms = parse_number(env_vars::POLL_INTERVAL_MS, &ms)?;
            settings = settings.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(secs) = lookup(env_vars::TIMEOUT_SECS) {
            let secs = parse_number(env_vars::TIMEOUT_SECS, &secs)?;
            settings = settings.with_timeout(Duration::from_secs(secs));
        }

        // Fail at startup rather than on the first request.
        settings.model_version()?;
        Ok(settings)
    }

    /// Version id of the configured model (the part after `:`).
    pub fn model_version(&self) -> Result<&str> {
        match self.model.rsplit_once(':') {
            Some((_, version)) if !version.is_empty() => Ok(version),
            _ => Err(EnhancerError::Config {
                message: format!(
                    "{} must be of the form owner/name:version, got '{}'",
                    env_vars::MODEL,
                    self.model
                ),
            }),
        }
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| EnhancerError::Config {
        message: format!("{} must be a non-negative integer, got '{}'", key, raw),
    })
}
