use crate::{EnhancerError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::fmt;
use url::Url;

/// An absolute `http`/`https` URL pointing at an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrl(Url);

impl ImageUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| EnhancerError::validation("image_url", format!("invalid URL '{}': {}", raw, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(EnhancerError::validation(
                "image_url",
                format!("URL scheme should be 'http' or 'https', got '{}'", url.scheme()),
            ));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(EnhancerError::validation("image_url", "URL host is required"));
        }

        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Where the model reads its input image from.
#[derive(Clone)]
pub enum ImageSource {
    Url(ImageUrl),
    Upload {
        filename: String,
        content_type: String,
        bytes: Bytes,
    },
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Url(url) => f.debug_tuple("Url").field(&url.as_str()).finish(),
            ImageSource::Upload {
                filename,
                content_type,
                bytes,
            } => f
                .debug_struct("Upload")
                .field("filename", filename)
                .field("content_type", content_type)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

impl ImageSource {
    /// Build an upload source, rejecting anything that is not declared as an image.
    pub fn upload(
        filename: impl Into<String>,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<Self> {
        let content_type = match content_type {
            Some(ct) if ct.starts_with("image/") => ct.to_string(),
            _ => return Err(EnhancerError::UnsupportedMedia("File must be an image".into())),
        };
        if bytes.is_empty() {
            return Err(EnhancerError::invalid_params("Uploaded file is empty"));
        }

        Ok(ImageSource::Upload {
            filename: filename.into(),
            content_type,
            bytes,
        })
    }

    /// Value passed as the model's `image` input: the URL itself, or a data URI.
    pub fn to_model_input(&self) -> String {
        match self {
            ImageSource::Url(url) => url.to_string(),
            ImageSource::Upload {
                content_type,
                bytes,
                ..
            } => format!("data:{};base64,{}", content_type, STANDARD.encode(bytes)),
        }
    }

    /// Short human-readable label for logs.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Url(url) => url.to_string(),
            ImageSource::Upload {
                filename, bytes, ..
            } => format!("upload '{}' ({} bytes)", filename, bytes.len()),
        }
    }
}
