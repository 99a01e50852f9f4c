use clap::Parser;
use mongogate_core::Authenticator;
use mongogate_storage::{DocumentStore, MongoStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod cors;
mod dispatch;
mod error;
mod metrics;
mod routes;

use config::Config;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn DocumentStore>,
    auth: Arc<Authenticator>,
    store_timeout: Duration,
    paginate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let auth = config.authenticator();
    if !auth.is_configured() {
        warn!("API_USERNAME / API_PASSWORD not set: every request will be rejected");
    }
    let state = AppState {
        store: Arc::new(MongoStore::new(
            config.mongo_uri.clone(),
            config.database.clone(),
        )),
        auth: Arc::new(auth),
        store_timeout: config.store_timeout(),
        paginate: config.pagination,
    };
    let prefix = config.route_prefix();
    let app = routes::router(state, &prefix);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "http listening on {} (prefix {:?}, pagination {})",
        addr, prefix, config.pagination
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("ctrl-c handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler failed: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
