use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tenantgate_auth::{AuthPipeline, InMemoryDirectory};
use tenantgate_server::{AppState, ServerConfig, build_app};
use tracing::{info, warn};

/// Multi-tenant API server guarded by identity-provider bearer tokens
#[derive(Parser, Debug)]
#[command(name = "tenantgate-server", version, about)]
struct Cli {
    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(long, short = 'c', env = "TENANTGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory seed file, overriding `directory_seed` from the config
    #[arg(long)]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let _log_guard = config.logging.init().context("initializing logging")?;

    let directory = match cli.seed.as_ref().or(config.directory_seed.as_ref()) {
        Some(path) => {
            let directory = InMemoryDirectory::from_file(path)
                .with_context(|| format!("reading directory seed {}", path.display()))?;
            info!(path = %path.display(), users = directory.user_count(), "Loaded directory seed");
            directory
        }
        None => {
            warn!("No directory seed configured; every token will resolve to an unknown user");
            InMemoryDirectory::new()
        }
    };
    let directory = Arc::new(directory);

    let pipeline = AuthPipeline::from_config(&config.identity, directory.clone(), directory.clone())
        .context("building auth pipeline")?
        .with_lookup_timeout(config.auth.lookup_timeout());

    let app = build_app(AppState {
        pipeline: Arc::new(pipeline),
        memberships: directory,
        detailed_errors: config.auth.detailed_errors,
    });

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(
        %address,
        jwks_uri = %config.identity.jwks_uri(),
        detailed_errors = config.auth.detailed_errors,
        "Tenantgate server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
