/// Ошибки уровня commit log.
///
/// `OutOfRange` — ожидаемое, восстанавливаемое состояние (например,
/// tail-чтение на границе лога), а не сбой.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("position is out of range: {position}")]
    OutOfRange { position: u64 },

    #[error("internal: {0}")]
    Internal(String),
}

impl LogError {
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, LogError::OutOfRange { .. })
    }
}
