//! Клиент commit log сервиса: HTTP для unary операций,
//! WebSocket для produce-stream и consume-stream.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use log_api::{ConsumeResponse, ErrorBody, ErrorCode, ProduceRequest, ProduceResponse, Record, StreamMessage};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ═══════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Позиция ещё не записана. Не сбой: лог просто короче.
    #[error("position is out of range: {position}")]
    OutOfRange { position: u64 },

    #[error("server ({code}): {message}")]
    Server { code: ErrorCode, message: String },

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("stream closed by server")]
    Closed,
}

impl ClientError {
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, ClientError::OutOfRange { .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(Box::new(e))
    }
}

impl From<ErrorBody> for ClientError {
    fn from(body: ErrorBody) -> Self {
        match (body.code, body.position) {
            (ErrorCode::OutOfRange, Some(position)) => ClientError::OutOfRange { position },
            (code, _) => ClientError::Server {
                code,
                message: body.message,
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  LogClient
// ═══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct LogClient {
    http: reqwest::Client,
    base_url: String,
}

impl LogClient {
    /// `addr` — `host:port` или полный `http://host:port`.
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let base_url = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", addr.trim_end_matches('/'))
        };
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn ws_url(&self, path: &str) -> String {
        let base = self
            .base_url
            .replacen("http://", "ws://", 1)
            .replacen("https://", "wss://", 1);
        format!("{base}{path}")
    }

    pub async fn produce(&self, value: impl Into<Bytes>) -> Result<u64, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/v1/produce", self.base_url))
            .json(&ProduceRequest { value: value.into() })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(decode_error(response).await);
        }
        let body: ProduceResponse = response.json().await?;
        Ok(body.position)
    }

    pub async fn consume(&self, position: u64) -> Result<Record, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/consume/{position}", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(decode_error(response).await);
        }
        let body: ConsumeResponse = response.json().await?;
        Ok(body.record)
    }

    pub async fn produce_stream(&self) -> Result<ProduceStream, ClientError> {
        let url = self.ws_url("/ws/produce");
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::debug!(%url, "produce stream connected");
        Ok(ProduceStream { socket })
    }

    pub async fn consume_stream(&self, position: u64) -> Result<ConsumeStream, ClientError> {
        let url = self.ws_url(&format!("/ws/consume?position={position}"));
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::debug!(%url, position, "consume stream connected");
        Ok(ConsumeStream { socket })
    }
}

async fn decode_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.into(),
        Err(_) => ClientError::Server {
            code: ErrorCode::Internal,
            message: format!("unexpected status {status}"),
        },
    }
}

/// Следующий кадр протокола. `None` — сервер закрыл соединение.
async fn next_frame(socket: &mut Socket) -> Option<Result<StreamMessage, ClientError>> {
    while let Some(msg) = socket.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => return Some(Err(e.into())),
        };
        return Some(serde_json::from_str(text.as_str()).map_err(ClientError::from));
    }
    None
}

// ═══════════════════════════════════════════════════════════════
//  ProduceStream
// ═══════════════════════════════════════════════════════════════

/// Двунаправленный produce: `send` значение, `recv` его позицию.
/// Ответы приходят строго в порядке отправки.
pub struct ProduceStream {
    socket: Socket,
}

impl ProduceStream {
    pub async fn send(&mut self, value: impl Into<Bytes>) -> Result<(), ClientError> {
        let json = serde_json::to_string(&ProduceRequest { value: value.into() })?;
        self.socket.send(Message::Text(json.into())).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<u64, ClientError> {
        match next_frame(&mut self.socket).await {
            Some(Ok(StreamMessage::Position { position })) => Ok(position),
            Some(Ok(StreamMessage::Error { error })) => Err(error.into()),
            Some(Ok(other)) => Err(ClientError::Server {
                code: ErrorCode::Internal,
                message: format!("unexpected frame: {other:?}"),
            }),
            Some(Err(e)) => Err(e),
            None => Err(ClientError::Closed),
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  ConsumeStream
// ═══════════════════════════════════════════════════════════════

/// Tail-подписка. `next` ждёт новую запись, пока она не появится.
pub struct ConsumeStream {
    socket: Socket,
}

impl ConsumeStream {
    /// `None` — сервер завершил стрим (например, при shutdown).
    pub async fn next(&mut self) -> Option<Result<Record, ClientError>> {
        match next_frame(&mut self.socket).await? {
            Ok(StreamMessage::Record { record }) => Some(Ok(record)),
            Ok(StreamMessage::Error { error }) => Some(Err(error.into())),
            Ok(other) => Some(Err(ClientError::Server {
                code: ErrorCode::Internal,
                message: format!("unexpected frame: {other:?}"),
            })),
            Err(e) => Some(Err(e)),
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_body_is_distinguishable() {
        let e = ClientError::from(ErrorBody::out_of_range(4));
        assert!(matches!(e, ClientError::OutOfRange { position: 4 }));
        assert!(e.is_out_of_range());

        let e = ClientError::from(ErrorBody::new(ErrorCode::Internal, "boom"));
        assert!(!e.is_out_of_range());
    }

    #[test]
    fn urls_accept_bare_addr() {
        let client = LogClient::new("127.0.0.1:8400");
        assert_eq!(client.base_url(), "http://127.0.0.1:8400");
        assert_eq!(client.ws_url("/ws/produce"), "ws://127.0.0.1:8400/ws/produce");

        let client = LogClient::new("https://log.local/");
        assert_eq!(client.ws_url("/ws/consume"), "wss://log.local/ws/consume");
    }
}
