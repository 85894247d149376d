//! Academy messaging server: student directory, message templates and
//! WhatsApp mass messaging behind an HTTP API.

use academy_api::ApiServer;
use academy_core::config::AppConfig;
use academy_store::DirectoryStore;
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "academy-server")]
#[command(about = "Music-school back office with WhatsApp mass messaging")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short = 'c', env = "ACADEMY_CONFIG")]
    config: Option<String>,

    /// Bind address (overrides config)
    #[arg(long, env = "ACADEMY__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "ACADEMY__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Prometheus exporter port (overrides config)
    #[arg(long, env = "ACADEMY__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Delay between consecutive sends in milliseconds (overrides config)
    #[arg(long, env = "ACADEMY__MESSAGING__PACING_MS")]
    pacing_ms: Option<u64>,
}

/// An explicitly given config file must load; only the env-only setup falls
/// back to defaults.
fn load_config(file: Option<&str>) -> anyhow::Result<AppConfig> {
    match file {
        Some(path) => AppConfig::load(Some(path))
            .with_context(|| format!("Failed to load config file '{path}'")),
        None => Ok(AppConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config from environment, using defaults");
            AppConfig::default()
        })),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "academy_server=info,academy_api=info,academy_messaging=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Academy server starting up");

    let mut config = load_config(cli.config.as_deref())?;

    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if let Some(pacing_ms) = cli.pacing_ms {
        config.messaging.pacing_ms = pacing_ms;
    }

    info!(
        school = %config.school_name,
        http_port = config.api.http_port,
        provider = ?config.messaging.provider,
        pacing_ms = config.messaging.pacing_ms,
        "Configuration loaded"
    );

    let store = Arc::new(DirectoryStore::with_demo_data());
    let api_server = ApiServer::new(config, store)?;

    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Academy server is ready to serve traffic");

    api_server.start_http().await?;

    Ok(())
}
