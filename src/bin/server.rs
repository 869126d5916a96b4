//! HTTP gateway issuing role keys and encrypting data under the registered
//! policies.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use cosmian_role_crypt::service::{router, ConfigLoader, Service};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "role-crypt-server")]
#[command(about = "Role-based attribute encryption gateway", version)]
struct Cli {
    /// Configuration file (defaults to `role-crypt.toml` in the working
    /// directory, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_config_file(path);
    }
    let mut config = loader.load()?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    let service = Service::new(&config).context("Failed to initialize the gateway")?;
    let app = router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!(address = %config.bind_address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
}
