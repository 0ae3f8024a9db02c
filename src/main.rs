//! claimgate - protected record API behind Keycloak / oauth2-proxy

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claimgate::config::ClaimgateConfig;
use claimgate::server;
use claimgate::store::InMemoryStore;

/// Role-based policy enforcement for services behind oauth2-proxy
#[derive(Parser, Debug)]
#[command(name = "claimgate", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CLAIMGATE_CONFIG", default_value = "claimgate.toml")]
    config: PathBuf,

    /// Override `server.bind` from the configuration
    #[arg(long)]
    bind: Option<String>,

    /// Validate the configuration, print the route policies and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = ClaimgateConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if cli.check {
        let routes = &config.routes;
        println!("audience: {}", config.oidc.audience());
        for (route, policy) in [
            ("GET    /api/protected-data", &routes.list),
            ("GET    /api/protected-data/{id}", &routes.get),
            ("POST   /api/protected-data", &routes.create),
            ("PUT    /api/protected-data/{id}", &routes.update),
            ("DELETE /api/protected-data/{id}", &routes.delete),
        ] {
            println!("{route:<34} {policy}");
        }
        return Ok(());
    }

    if config.dev_claims().is_some() {
        tracing::warn!(
            "local development mode enabled: requests without identity get the mock user"
        );
    }

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let app = server::app(&config, Arc::new(InMemoryStore::seeded()));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        audience = config.oidc.audience(),
        "claimgate listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("claimgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
