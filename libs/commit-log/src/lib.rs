use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::watch;

use log_api::{CommitLog, LogError, Record};

// ═══════════════════════════════════════════════════════════════
//  MemoryLog
// ═══════════════════════════════════════════════════════════════

/// In-memory append-only лог.
///
/// Один mutex охраняет вектор записей, длина лога это длина вектора,
/// поэтому хранилище и длина всегда читаются и меняются вместе.
/// Критические секции короткие: без I/O и без `.await` под lock'ом.
///
/// После каждого append новая длина публикуется в `watch` канал
/// (внутри той же критической секции, чтобы значения шли по порядку).
/// Tail-читатели ждут на канале, а не крутятся на mutex'е.
pub struct MemoryLog {
    records: Mutex<Vec<Record>>,
    committed: watch::Sender<u64>,
}

impl std::fmt::Debug for MemoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLog").field("len", &self.len()).finish()
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Лог с заранее выделенным местом под `capacity` записей.
    /// Лимита на размер нет.
    pub fn with_capacity(capacity: usize) -> Self {
        let (committed, _) = watch::channel(0);
        Self {
            records: Mutex::new(Vec::with_capacity(capacity)),
            committed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        match self.records.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                // В векторе лежат только полностью добавленные записи.
                tracing::warn!("commit log lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl CommitLog for MemoryLog {
    fn append(&self, value: Bytes) -> Result<u64, LogError> {
        let mut records = self.lock();
        let position = records.len() as u64;
        records.push(Record { value, position });
        self.committed.send_replace(position + 1);
        drop(records);

        tracing::trace!(position, "appended record");
        Ok(position)
    }

    fn read(&self, position: u64) -> Result<Record, LogError> {
        let records = self.lock();
        usize::try_from(position)
            .ok()
            .and_then(|idx| records.get(idx))
            .cloned()
            .ok_or(LogError::OutOfRange { position })
    }

    fn len(&self) -> u64 {
        self.lock().len() as u64
    }

    fn wait_for(&self, position: u64) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let mut rx = self.committed.subscribe();
        Box::pin(async move {
            // Sender принадлежит логу и живёт дольше `&self`: Err невозможен.
            let _ = rx.wait_for(|len| *len > position).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    const NUM_OF_WRITES: u64 = 3;

    #[test]
    fn append_then_read() {
        let log = MemoryLog::new();
        for i in 0..NUM_OF_WRITES {
            let value = Bytes::from(format!("hello world {i}"));
            let position = log.append(value.clone()).unwrap();
            assert_eq!(position, i);

            let record = log.read(position).unwrap();
            assert_eq!(record.value, value);
            assert_eq!(record.position, i);
        }
        assert_eq!(log.len(), NUM_OF_WRITES);
    }

    #[test]
    fn read_past_end_is_out_of_range() {
        let log = MemoryLog::new();
        assert_eq!(log.read(0), Err(LogError::OutOfRange { position: 0 }));

        for _ in 0..NUM_OF_WRITES {
            log.append(Bytes::from_static(b"x")).unwrap();
        }
        assert_eq!(
            log.read(NUM_OF_WRITES),
            Err(LogError::OutOfRange { position: NUM_OF_WRITES })
        );
        assert_eq!(
            log.read(u64::MAX),
            Err(LogError::OutOfRange { position: u64::MAX })
        );
    }

    #[test]
    fn earlier_records_survive_later_appends() {
        let log = MemoryLog::new();
        log.append(Bytes::from_static(b"first")).unwrap();
        for _ in 0..100 {
            log.append(Bytes::from_static(b"filler")).unwrap();
        }
        let record = log.read(0).unwrap();
        assert_eq!(record.value, Bytes::from_static(b"first"));
        assert_eq!(record.position, 0);
    }

    #[test]
    fn concurrent_appends_are_gapless() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 250;

        let log = Arc::new(MemoryLog::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|i| {
                            let value = Bytes::from(format!("{t}:{i}"));
                            (log.append(value.clone()).unwrap(), value)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for (position, value) in h.join().unwrap() {
                assert!(seen.insert(position), "duplicate position {position}");
                assert_eq!(log.read(position).unwrap().value, value);
            }
        }

        let total = THREADS * PER_THREAD;
        assert_eq!(log.len(), total);
        assert_eq!(seen, (0..total).collect::<HashSet<_>>());
    }

    #[test]
    fn instances_are_independent() {
        let a = MemoryLog::new();
        let b = MemoryLog::new();
        a.append(Bytes::from_static(b"a")).unwrap();
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
        assert!(b.read(0).unwrap_err().is_out_of_range());
    }

    #[tokio::test]
    async fn wait_for_resolves_immediately_when_available() {
        let log = MemoryLog::new();
        log.append(Bytes::from_static(b"foo")).unwrap();
        tokio::time::timeout(Duration::from_secs(1), log.wait_for(0))
            .await
            .expect("record 0 is already committed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_for_blocks_until_append() {
        let log = Arc::new(MemoryLog::new());
        log.append(Bytes::from_static(b"foo")).unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), log.wait_for(1)).await;
        assert!(pending.is_err(), "position 1 is not written yet");

        let waiter = {
            let log = log.clone();
            tokio::spawn(async move {
                log.wait_for(1).await;
                log.read(1)
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        log.append(Bytes::from_static(b"bar")).unwrap();

        let record = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke up")
            .unwrap()
            .unwrap();
        assert_eq!(record.value, Bytes::from_static(b"bar"));
        assert_eq!(record.position, 1);
    }
}
