use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use log_api::{ErrorBody, ErrorCode, LogError};

/// Ошибки Endpoint-слоя.
///
/// Варианты различаются явно: `NotFound` — ожидаемая ситуация
/// (позиция ещё не записана), остальные завершают запрос/стрим.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("position is out of range: {0}")]
    NotFound(u64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("stream transport: {0}")]
    Transport(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<LogError> for ServiceError {
    fn from(e: LogError) -> Self {
        match e {
            LogError::OutOfRange { position } => ServiceError::NotFound(position),
            LogError::Internal(msg) => ServiceError::Internal(msg),
        }
    }
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::NotFound(_) => ErrorCode::OutOfRange,
            ServiceError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            ServiceError::Transport(_) => ErrorCode::Transport,
            ServiceError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Transport(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Тело ошибки для HTTP-ответа или stream-кадра `error`.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            ServiceError::NotFound(position) => ErrorBody::out_of_range(*position),
            other => ErrorBody::new(other.code(), other.to_string()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_maps_to_not_found() {
        let e = ServiceError::from(LogError::OutOfRange { position: 3 });
        assert_eq!(e, ServiceError::NotFound(3));
        assert!(e.is_not_found());
        assert_eq!(e.status(), StatusCode::NOT_FOUND);

        let body = e.to_body();
        assert_eq!(body.code, ErrorCode::OutOfRange);
        assert_eq!(body.position, Some(3));
        assert!(body.localized_message.is_some());
    }

    #[test]
    fn internal_is_a_fault() {
        let e = ServiceError::from(LogError::Internal("disk on fire".into()));
        assert!(!e.is_not_found());
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.to_body().position, None);
        assert_eq!(e.to_body().message, "internal: disk on fire");
    }
}
