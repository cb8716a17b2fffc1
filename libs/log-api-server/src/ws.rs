use axum::extract::rejection::QueryRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::future::ready;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;

use log_api::{ProduceRequest, StreamMessage};

use crate::AppState;
use crate::error::ServiceError;

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /ws/produce
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_produce_stream(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let streams = state.streams.clone();
        streams.track_future(produce_stream_connection(socket, state))
    })
}

/// Входной кадр → значение для append.
///
/// Text — JSON `ProduceRequest`, Binary — сырые байты значения.
/// Ping/Pong пропускаются (на ping axum отвечает сам).
fn decode_produce_frame(msg: Result<Message, axum::Error>) -> Option<Result<Bytes, ServiceError>> {
    match msg {
        Ok(Message::Text(text)) => Some(
            serde_json::from_str::<ProduceRequest>(text.as_str())
                .map(|req| req.value)
                .map_err(|e| ServiceError::InvalidRequest(e.to_string())),
        ),
        Ok(Message::Binary(value)) => Some(Ok(value)),
        Ok(Message::Ping(_) | Message::Pong(_)) => None,
        // Close отсекается take_while выше по цепочке.
        Ok(Message::Close(_)) => None,
        Err(e) => Some(Err(ServiceError::Transport(e.to_string()))),
    }
}

async fn produce_stream_connection(socket: WebSocket, state: AppState) {
    let (mut sender, receiver) = socket.split();

    let input = receiver
        .take_while(|msg| ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| ready(decode_produce_frame(msg)));

    let mut responses = std::pin::pin!(state.endpoints.produce_stream(input));
    let mut accepted = 0u64;

    while let Some(result) = responses.next().await {
        let (msg, terminal) = match result {
            Ok(position) => {
                accepted += 1;
                (StreamMessage::Position { position }, false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "produce stream aborted");
                (StreamMessage::Error { error: e.to_body() }, true)
            }
        };

        if let Err(e) = send_frame(&mut sender, &msg).await {
            tracing::debug!(error = %e, "produce stream send failed");
            return;
        }
        if terminal {
            break;
        }
    }

    let _ = sender.close().await;
    tracing::debug!(accepted, "produce stream closed");
}

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /ws/consume?position=N
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct ConsumeStreamParams {
    #[serde(default)]
    position: u64,
}

pub(crate) async fn handle_consume_stream(
    State(state): State<AppState>,
    params: Result<Query<ConsumeStreamParams>, QueryRejection>,
    ws: WebSocketUpgrade,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(e) => return ServiceError::InvalidRequest(e.body_text()).into_response(),
    };
    ws.on_upgrade(move |socket| {
        let streams = state.streams.clone();
        streams.track_future(consume_stream_connection(socket, state, params.position))
    })
}

async fn consume_stream_connection(socket: WebSocket, state: AppState, start: u64) {
    let (mut sender, mut receiver) = socket.split();

    // Дочерний token: shutdown сервера завершает все tail'ы,
    // а закрытие одного клиента не трогает остальных.
    let cancel = state.shutdown.child_token();
    let mut records = std::pin::pin!(state.endpoints.consume_stream(start, cancel.clone()));

    loop {
        tokio::select! {
            biased;

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(position = start, "consume stream closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "consume stream receive failed");
                        break;
                    }
                    Some(Ok(_)) => continue,
                }
            }

            item = records.next() => {
                match item {
                    Some(Ok(record)) => {
                        if let Err(e) = send_frame(&mut sender, &StreamMessage::Record { record }).await {
                            tracing::debug!(error = %e, "consume stream send failed");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "consume stream aborted");
                        if let Err(send_err) = send_frame(&mut sender, &StreamMessage::Error { error: e.to_body() }).await {
                            tracing::debug!(error = %send_err, "consume stream error frame send failed");
                        }
                        break;
                    }
                    // Отменён: shutdown сервера.
                    None => break,
                }
            }
        }
    }

    cancel.cancel();
    let _ = sender.close().await;
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

async fn send_frame<S>(sender: &mut S, msg: &StreamMessage) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
