mod bootstrap;
mod health;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use sofra_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;

use crate::bootstrap::Application;

fn init_logging(config: &AppConfig) {
    use sofra_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default()).context("loading configuration")?;
    init_logging(&config);

    let app = bootstrap::bootstrap(config).await.context("bootstrapping application")?;
    serve(app).await
}

fn routes(app: &Application) -> Router {
    let state = webhook::WebhookState::new(
        app.conversation.clone(),
        app.config.whatsapp.verify_token.clone(),
        app.config.whatsapp.app_secret.clone(),
    );
    Router::new().merge(health::router(app.db_pool.clone())).merge(webhook::router(state))
}

async fn serve(app: Application) -> Result<()> {
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    tracing::info!(address = %address, "webhook server listening");

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let shutdown_started = Arc::new(Notify::new());
    let notify_shutdown = shutdown_started.clone();

    let server = axum::serve(listener, routes(&app)).with_graceful_shutdown(async move {
        wait_for_shutdown().await;
        notify_shutdown.notify_waiters();
    });

    // After the signal, in-flight requests get the configured window to
    // drain before the process gives up on them.
    let drain_deadline = async {
        shutdown_started.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result.context("serving webhook requests")?,
        _ = drain_deadline => {
            tracing::warn!("graceful shutdown window elapsed before requests drained");
        }
    }

    tracing::info!("sofra-server stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "shutdown signal listener failed");
        return;
    }
    tracing::info!("shutdown signal received");
}
