use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use log_api::{CommitLog, Record};

use crate::error::ServiceError;

// ═══════════════════════════════════════════════════════════════
//  Endpoints — transport-independent request handling
// ═══════════════════════════════════════════════════════════════

/// Четыре операции над commit log'ом: produce, consume,
/// produce-stream и consume-stream (tail).
///
/// Сам данных не хранит: держит одну ссылку на лог, созданный
/// при старте и переданный снаружи.
#[derive(Clone)]
pub struct Endpoints {
    log: Arc<dyn CommitLog>,
}

impl Endpoints {
    pub fn new(log: Arc<dyn CommitLog>) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &Arc<dyn CommitLog> {
        &self.log
    }

    /// Добавить значение, вернуть назначенную позицию.
    pub fn produce(&self, value: Bytes) -> Result<u64, ServiceError> {
        Ok(self.log.append(value)?)
    }

    /// Прочитать запись. Позиция за концом лога → `NotFound(position)`.
    pub fn consume(&self, position: u64) -> Result<Record, ServiceError> {
        Ok(self.log.read(position)?)
    }

    /// Produce для каждого входного значения по очереди.
    ///
    /// Следующее значение забирается из `input` только после того, как
    /// позиция предыдущего отдана наружу, поэтому N-й ответ всегда
    /// соответствует N-му принятому append. Первая ошибка (входа или
    /// лога) отдаётся один раз и завершает стрим.
    pub fn produce_stream<S>(
        &self,
        input: S,
    ) -> impl Stream<Item = Result<u64, ServiceError>> + Send + 'static
    where
        S: Stream<Item = Result<Bytes, ServiceError>> + Send + 'static,
    {
        let this = self.clone();
        async_stream::stream! {
            let mut input = std::pin::pin!(input);
            while let Some(item) = input.next().await {
                let result = item.and_then(|value| this.produce(value));
                let failed = result.is_err();
                yield result;
                if failed {
                    break;
                }
            }
        }
    }

    /// Tail-чтение начиная с `start`.
    ///
    /// Курсор двигается на одну позицию после каждой отданной записи.
    /// `NotFound` на курсоре означает, что читатель догнал конец лога:
    /// стрим ждёт append на этой позиции и повторяет попытку. Любая
    /// другая ошибка отдаётся и завершает стрим. Отмена `cancel`
    /// проверяется перед каждой попыткой и во время ожидания, стрим
    /// при этом просто заканчивается.
    pub fn consume_stream(
        &self,
        start: u64,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<Record, ServiceError>> + Send + 'static {
        let this = self.clone();
        async_stream::stream! {
            let mut cursor = start;
            tracing::debug!(position = start, "consume stream started");
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                match this.consume(cursor) {
                    Ok(record) => {
                        cursor += 1;
                        yield Ok(record);
                    }
                    Err(ServiceError::NotFound(_)) => {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = this.log.wait_for(cursor) => {}
                        }
                    }
                    Err(e) => {
                        tracing::warn!(position = cursor, error = %e, "consume stream failed");
                        yield Err(e);
                        break;
                    }
                }
            }
            tracing::debug!(position = cursor, "consume stream finished");
        }
    }
}
