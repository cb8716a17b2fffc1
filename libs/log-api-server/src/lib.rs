mod endpoints;
mod error;
mod http;
mod ws;

use std::net::SocketAddr;
use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub use endpoints::Endpoints;
pub use error::ServiceError;

#[derive(Clone)]
pub(crate) struct AppState {
    endpoints: Endpoints,
    shutdown: CancellationToken,
    /// Upgrade'нутые WebSocket-соединения: axum их после upgrade не видит.
    streams: TaskTracker,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    #[error("bind api {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("axum serve: {0}")]
    Serve(#[source] std::io::Error),
}

/// HTTP + WebSocket router поверх `Endpoints`.
///
/// `shutdown` завершает все открытые consume-стримы, `streams`
/// учитывает каждое WebSocket-соединение до его закрытия.
pub fn router(endpoints: Endpoints, shutdown: CancellationToken, streams: TaskTracker) -> Router {
    let state = AppState {
        endpoints,
        shutdown,
        streams,
    };

    Router::new()
        .route("/api/v1/produce", post(http::handle_produce))
        .route("/api/v1/consume/{position}", get(http::handle_consume))
        .route("/ws/produce", get(ws::handle_produce_stream))
        .route("/ws/consume", get(ws::handle_consume_stream))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ApiServerError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ApiServerError::Bind { addr, source })
}

/// Обслуживать запросы на уже открытом listener'е до отмены `shutdown`.
///
/// После отмены новые соединения не принимаются, открытые
/// HTTP-запросы дорабатывают, tail-стримы закрываются.
/// Возврат только после закрытия всех WebSocket-стримов: открытый
/// produce-стрим держит `serve`, пока клиент его не закроет.
pub async fn serve(
    listener: TcpListener,
    endpoints: Endpoints,
    shutdown: CancellationToken,
) -> Result<(), ApiServerError> {
    let streams = TaskTracker::new();
    let app = router(endpoints, shutdown.clone(), streams.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(ApiServerError::Serve)?;

    streams.close();
    if !streams.is_empty() {
        tracing::info!(open = streams.len(), "waiting for websocket streams");
    }
    streams.wait().await;

    tracing::info!("api server stopped");
    Ok(())
}

/// Bind `host:port` и обслуживать до отмены `shutdown`.
pub async fn run(
    host: &str,
    port: u16,
    endpoints: Endpoints,
    shutdown: CancellationToken,
) -> Result<(), ApiServerError> {
    let listener = bind(host, port).await?;
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(addr = ?addr, "api server (http+ws) listening");
    serve(listener, endpoints, shutdown).await
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        http.time_ns = elapsed_ns(started),
        "request finished"
    );
    response
}

fn elapsed_ns(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX)
}
