//! Enhancer Server - HTTP API for AI image enhancement.
//!
//! Serves the enhancement endpoints on `0.0.0.0:${PORT}` and doubles as its
//! own container health probe (`enhancer-server healthcheck`), so both sides
//! resolve the port through the same arguments.

mod handlers;
mod healthcheck;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use enhancer_core::config::{NetworkConfig, ServiceConfig};
use enhancer_core::{ReplicateClient, ReplicateSettings};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "enhancer-server", version)]
#[command(about = "Image enhancement API backed by Real-ESRGAN")]
struct Args {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = ServiceConfig::DEFAULT_HOST)]
    host: String,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, env = "PORT", default_value_t = ServiceConfig::DEFAULT_PORT)]
    port: u16,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log line format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = ServiceConfig::MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the local `/health` endpoint and exit non-zero if it is not healthy
    Healthcheck {
        /// Probe timeout in seconds
        #[arg(long, default_value_t = NetworkConfig::HEALTHCHECK_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

fn init_logging(debug: bool, format: LogFormat) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(Command::Healthcheck { timeout_secs }) = args.command {
        return healthcheck::probe(args.port, Duration::from_secs(timeout_secs)).await;
    }

    init_logging(args.debug, args.log_format);
    info!("Starting {} v{}", ServiceConfig::SERVICE_NAME, env!("CARGO_PKG_VERSION"));

    let settings = ReplicateSettings::from_env().context("Invalid Replicate configuration")?;
    info!("Using model {}", settings.model);
    let upscaler = ReplicateClient::new(settings)?;

    let state = Arc::new(
        server::AppState::new(Arc::new(upscaler)).with_max_upload_bytes(args.max_upload_bytes),
    );
    let (addr, handle) =
        server::start_server(state, &args.host, args.port, server::shutdown_signal()).await?;

    info!("Enhancer API running on {}", addr);

    handle.await??;
    info!("Server stopped");

    Ok(())
}
