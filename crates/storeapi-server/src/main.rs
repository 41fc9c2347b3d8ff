mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use storeapi_api::{AppState, AppStateInner, routes};
use storeapi_db::Database;
use storeapi_security::TokenService;
use storeapi_worker::{DeepAiClient, MailgunMailer, TaskQueue, WorkerContext, WorkerPool};

use crate::config::{Config, EnvState};

/// How long to let background jobs finish after the server stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(70);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storeapi=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("Starting in {:?} mode", config.env_state);

    let tokens = TokenService::new(config.secret_key.as_deref());
    if !tokens.is_configured() {
        if config.env_state == EnvState::Prod {
            bail!("PROD_SECRET_KEY must be set");
        }
        warn!("No SECRET_KEY configured: registration and login will fail");
    }
    if config.mailgun_domain.is_none() || config.mailgun_api_key.is_none() {
        warn!("Mailgun is not configured: emails will not be delivered");
    }
    if config.deepai_api_key.is_none() {
        warn!("DeepAI is not configured: image generation will always fail");
    }
    for key in &config.ignored_keys {
        warn!("{} is set but not supported by this server; ignoring it", key);
    }

    let db = Arc::new(Database::connect(&config.database_url, config.db_force_rollback)?);

    // Background workers
    let http = reqwest::Client::new();
    let (queue, rx) = TaskQueue::channel();
    let pool = WorkerPool::spawn(
        WorkerContext {
            db: db.clone(),
            mailer: Arc::new(MailgunMailer::new(
                http.clone(),
                config.mailgun_domain.clone(),
                config.mailgun_api_key.clone(),
            )),
            images: Arc::new(DeepAiClient::new(http, config.deepai_api_key.clone())),
        },
        rx,
        config.workers,
    );

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens,
        queue,
        base_url: config.base_url.clone(),
    });

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("storeapi listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue handle; workers stop once the backlog is empty
    info!("Draining background jobs");
    if tokio::time::timeout(DRAIN_TIMEOUT, pool.join()).await.is_err() {
        warn!("Background jobs still running after {:?}, abandoning them", DRAIN_TIMEOUT);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
