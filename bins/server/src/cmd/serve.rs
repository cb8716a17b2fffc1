use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use commit_log::MemoryLog;
use log_api::CommitLog;
use log_api_server::Endpoints;

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("commitlog-server starting");

    // --- Load config ---
    let config = ServerConfig::resolve(&args)?;
    tracing::info!(config = ?args.config, host = %config.host, port = config.port, "loaded config");

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Commit log + endpoints ---
    let log: Arc<dyn CommitLog> = Arc::new(MemoryLog::new());
    let endpoints = Endpoints::new(log.clone());

    // --- API server (HTTP + WS) ---
    // Bind до spawn, чтобы занятый порт был ошибкой старта.
    let listener = log_api_server::bind(&config.host, config.port).await?;
    let addr = listener.local_addr()?;
    let api_token = token.clone();
    let mut api_handle = tokio::spawn(async move {
        log_api_server::serve(listener, endpoints, api_token).await
    });

    tracing::info!(%addr, "api server (http+ws) listening");
    tracing::info!("server ready");

    // --- Ожидание Ctrl+C / SIGTERM ---
    tokio::select! {
        signal = shutdown_signal() => signal?,
        finished = &mut api_handle => {
            // Сервер упал сам, до сигнала.
            finished??;
            return Ok(());
        }
    }
    tracing::info!("shutting down...");

    // Stop accepting, end tails, let in-flight requests and produce streams finish
    token.cancel();

    let drain = Duration::from_secs(config.drain_timeout_secs);
    match tokio::time::timeout(drain, &mut api_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "api server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "api task failed"),
        Err(_) => {
            tracing::warn!(timeout_secs = config.drain_timeout_secs, "drain timeout, aborting");
            api_handle.abort();
        }
    }

    tracing::info!(records = log.len(), "shutdown complete");
    Ok(())
}

/// SIGINT (Ctrl+C) или SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<(), std::io::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<std::io::Result<()>>();

    tokio::select! {
        res = ctrl_c => res,
        res = terminate => res,
    }
}
