//! Container health probe.

use anyhow::{bail, Context, Result};
use std::time::Duration;

pub fn health_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/health", port)
}

/// Request `/health` on the local server; any non-2xx answer is an error.
pub async fn probe(port: u16, timeout: Duration) -> Result<()> {
    let url = health_url(port);
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Health check request to {} failed", url))?;

    if !response.status().is_success() {
        bail!("Health check at {} returned {}", url, response.status());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url() {
        assert_eq!(health_url(8000), "http://127.0.0.1:8000/health");
    }

    #[tokio::test]
    async fn test_probe_fails_without_server() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(probe(port, Duration::from_secs(2)).await.is_err());
    }
}
