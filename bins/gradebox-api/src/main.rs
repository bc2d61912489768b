mod config;
mod engine;
mod executor;
mod handlers;
mod memory;
mod routes;
#[cfg(test)]
mod testing;

use anyhow::Context;
use axum::Router;
use config::ServerConfig;
use engine::DockerRuntime;
use executor::{Pipeline, PipelineOptions};
use gradebox_common::config::LanguageTable;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

pub struct AppState {
    pub pipeline: Pipeline,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Gradebox API booting...");

    let config = ServerConfig::from_env()?;

    let languages = LanguageTable::load_or_builtin(config.languages_config.as_deref())
        .map_err(|e| {
            error!("Failed to load language configurations: {}", e);
            e
        })?;

    info!("Loaded language configurations for: {:?}", languages.names());
    for lang in languages.iter() {
        info!(
            language = %lang.name,
            sandbox = %lang.sandbox_name(),
            file = lang.file_name(),
            command = %lang.run_command,
            "Language configured"
        );
    }

    info!(strategy = %config.strategy, "Grading strategy selected");
    match config.exec_timeout {
        Some(timeout) => info!(timeout_ms = timeout.as_millis() as u64, "Execution timeout enabled"),
        None => warn!("No execution timeout: a program that never exits blocks its request indefinitely"),
    }
    if config.serialize_sandboxes {
        info!("Sandbox serialization enabled: one submission per sandbox at a time");
    } else {
        warn!("Sandbox serialization disabled: concurrent submissions for one language may see each other's program or output");
    }

    let runtime = DockerRuntime::connect()?;
    info!("Connected to Docker daemon");

    let pipeline = Pipeline::new(
        Arc::new(runtime),
        languages,
        PipelineOptions {
            strategy: config.strategy,
            exec_timeout: config.exec_timeout,
            serialize_sandboxes: config.serialize_sandboxes,
        },
    );

    let state = Arc::new(AppState { pipeline });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Gradebox API shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    warn!("Received shutdown signal, finishing in-flight submissions...");
}
