use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Record;

// ════════════════════════════════════════════════════════════════
//  Unary requests / responses
// ════════════════════════════════════════════════════════════════

/// Тело `POST /api/v1/produce` и кадр produce-stream от клиента.
/// Позицию клиент не передаёт: её назначает лог.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceRequest {
    #[serde(with = "base64_bytes")]
    pub value: Bytes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceResponse {
    pub position: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeResponse {
    pub record: Record,
}

// ════════════════════════════════════════════════════════════════
//  Stream frames (server → client)
// ════════════════════════════════════════════════════════════════

/// Текстовый кадр WebSocket-стримов.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Ответ produce-stream: позиция N-го принятого значения.
    Position { position: u64 },
    /// Очередная запись consume-stream.
    Record { record: Record },
    /// Терминальная ошибка; после неё сервер закрывает соединение.
    Error { error: ErrorBody },
}

// ════════════════════════════════════════════════════════════════
//  Errors on the wire
// ════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Запрошенная позиция ещё не записана (not found).
    OutOfRange,
    /// Не удалось разобрать запрос.
    InvalidRequest,
    /// Сбой отправки/приёма в открытом стриме.
    Transport,
    /// Любая другая ошибка storage-слоя.
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::OutOfRange => f.write_str("out_of_range"),
            ErrorCode::InvalidRequest => f.write_str("invalid_request"),
            ErrorCode::Transport => f.write_str("transport"),
            ErrorCode::Internal => f.write_str("internal"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedMessage {
    pub locale: String,
    pub message: String,
}

/// Тело ответа об ошибке (HTTP и stream-кадр `error`).
///
/// Для `OutOfRange` всегда заполнены `position` и `localized_message`,
/// чтобы клиент мог отличить «лог слишком короткий» от сбоя.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_message: Option<LocalizedMessage>,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            position: None,
            localized_message: None,
        }
    }

    pub fn out_of_range(position: u64) -> Self {
        Self {
            code: ErrorCode::OutOfRange,
            message: format!("position is out of range: {position}"),
            position: Some(position),
            localized_message: Some(LocalizedMessage {
                locale: "en-US".to_string(),
                message: format!(
                    "The requested position is outside of the log's range: {position}"
                ),
            }),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  serde helper: Bytes <-> base64 string
// ════════════════════════════════════════════════════════════════

pub mod base64_bytes {
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(value);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_frame_is_tagged_and_base64() {
        let msg = StreamMessage::Record {
            record: Record {
                value: Bytes::from_static(b"foo"),
                position: 0,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "record",
                "record": { "value": "Zm9v", "position": 0 }
            })
        );
    }

    #[test]
    fn out_of_range_body_carries_position() {
        let body = ErrorBody::out_of_range(7);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "out_of_range");
        assert_eq!(json["position"], 7);
        assert_eq!(
            json["localized_message"]["message"],
            "The requested position is outside of the log's range: 7"
        );
    }

    #[test]
    fn produce_request_rejects_invalid_base64() {
        let err = serde_json::from_str::<ProduceRequest>(r#"{"value":"@@@"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn generic_error_omits_position() {
        let body = ErrorBody::new(ErrorCode::Internal, "boom");
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"code":"internal","message":"boom"}"#);
    }
}
