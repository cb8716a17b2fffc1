pub mod error;
pub mod wire;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use error::LogError;
pub use wire::{
    ConsumeResponse, ErrorBody, ErrorCode, LocalizedMessage, ProduceRequest, ProduceResponse,
    StreamMessage,
};

// ════════════════════════════════════════════════════════════════
//  Record
// ════════════════════════════════════════════════════════════════

/// Одна неизменяемая запись лога.
///
/// `value` — непрозрачные байты, лог их никогда не интерпретирует.
/// `position` назначается логом при append и равна порядковому номеру
/// вставки (с нуля). В JSON `value` кодируется в base64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(with = "wire::base64_bytes")]
    pub value: Bytes,
    pub position: u64,
}

impl Record {
    /// Значение как UTF-8 текст (с заменой невалидных последовательностей).
    pub fn value_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

// ════════════════════════════════════════════════════════════════
//  CommitLog trait
// ════════════════════════════════════════════════════════════════

/// Append-only лог записей. Единственный источник истины о том,
/// что было записано.
///
/// Реализация обязана гарантировать линеаризуемость: позиции
/// выдаются без пропусков и повторов, `read` видит либо состояние
/// до append, либо после, но никогда промежуточное.
///
/// Endpoint-слой держит `Arc<dyn CommitLog>`, созданный при старте.
pub trait CommitLog: Send + Sync {
    /// Добавить значение в конец лога. Возвращает назначенную позицию.
    fn append(&self, value: Bytes) -> Result<u64, LogError>;

    /// Прочитать запись по позиции. `OutOfRange`, если `position >= len`.
    fn read(&self, position: u64) -> Result<Record, LogError>;

    /// Текущее количество записей.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Дождаться, пока запись с `position` станет доступна для чтения.
    ///
    /// Завершается сразу, если `position < len`. Не держит lock лога
    /// во время ожидания; future можно безопасно дропнуть.
    fn wait_for(&self, position: u64) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
