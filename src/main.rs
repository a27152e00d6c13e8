use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use forum_mcp::config::{Settings, TransportMode};
use forum_mcp::server;
use forum_mcp::tools::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Tracing may not be initialized yet when startup fails.
        eprintln!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Load and validate configuration
    let settings = Settings::from_env().context("Failed to load configuration")?;
    settings.validate().context("Invalid configuration")?;

    // Initialize logging
    init_tracing(&settings)?;

    info!(
        backend = %settings.backend_base_url,
        transport = settings.transport.as_str(),
        "Starting forum-mcp"
    );

    let state = Arc::new(AppState::new(settings.clone()).context("Failed to build shared state")?);

    match settings.transport {
        TransportMode::Stdio => server::serve_stdio(state).await?,
        TransportMode::Sse => {
            let addr = bind_addr(&settings)?;
            server::serve_sse(state, addr).await?;
        }
        TransportMode::StreamableHttp => {
            let addr = bind_addr(&settings)?;
            server::serve_streamable_http(state, addr).await?;
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn bind_addr(settings: &Settings) -> Result<SocketAddr> {
    format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", settings.host, settings.port))
}

fn init_tracing(settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},forum_mcp=debug", settings.log_level)));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // Logs go to stderr: stdout is reserved for the stdio transport.
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
