use crate::codec;
use crate::domain::Cart;
use crate::events::{
    CartEvent, PersistEvent, PersistFailedEvent, PersistSkippedEvent, now_timestamp_ms, publish,
};
use crate::ports::KeyValueStore;
use shared::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Result of one scheduled snapshot write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Applied,
    /// A snapshot with a higher sequence was already stored.
    Skipped { newer: u64 },
    Failed(Error),
}

/// Writes whole-cart snapshots to the store in sequence order.
///
/// Writes take turns on `last_applied`; a write whose sequence is not newer
/// than the last one stored is dropped instead of overwriting it.
pub struct SnapshotWriter {
    store: Arc<dyn KeyValueStore>,
    key: String,
    timeout: Option<Duration>,
    attempts: u32,
    last_applied: Mutex<u64>,
    events: broadcast::Sender<CartEvent>,
}

impl SnapshotWriter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        timeout: Option<Duration>,
        attempts: u32,
        events: broadcast::Sender<CartEvent>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            timeout,
            attempts: attempts.max(1),
            last_applied: Mutex::new(0),
            events,
        }
    }

    /// Sequence of the newest snapshot known to be in the store (0 = none yet).
    pub async fn last_applied(&self) -> u64 {
        *self.last_applied.lock().await
    }

    pub async fn write(&self, sequence: u64, snapshot: Arc<Cart>) -> WriteOutcome {
        let mut last_applied = self.last_applied.lock().await;

        if *last_applied >= sequence {
            let newer = *last_applied;
            debug!(sequence, newer, "Discarding stale cart snapshot");
            publish(
                &self.events,
                CartEvent::PersistSkipped(PersistSkippedEvent {
                    sequence,
                    newer,
                    timestamp: now_timestamp_ms(),
                }),
            );
            return WriteOutcome::Skipped { newer };
        }

        let result = match codec::encode(&snapshot) {
            Ok(payload) => self.set_with_retry(sequence, payload).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                *last_applied = sequence;
                debug!(sequence, items = snapshot.len(), "Persisted cart snapshot");
                publish(
                    &self.events,
                    CartEvent::Persisted(PersistEvent {
                        sequence,
                        timestamp: now_timestamp_ms(),
                    }),
                );
                WriteOutcome::Applied
            }
            Err(e) => {
                let error = Error::StoreWrite(e.to_string());
                warn!(sequence, error = %error, "Cart snapshot not persisted; in-memory cart kept");
                publish(
                    &self.events,
                    CartEvent::PersistFailed(PersistFailedEvent {
                        sequence,
                        reason: error.to_string(),
                        timestamp: now_timestamp_ms(),
                    }),
                );
                WriteOutcome::Failed(error)
            }
        }
    }

    async fn set_with_retry(&self, sequence: u64, payload: String) -> Result<()> {
        let mut attempt = 1;
        loop {
            match with_timeout(self.timeout, self.store.set(&self.key, payload.clone())).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.attempts => {
                    warn!(sequence, attempt, error = %e, "Cart write failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Bound a store call by `limit` when one is configured.
pub(crate) async fn with_timeout<T, F>(limit: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(duration) => tokio::time::timeout(duration, call)
            .await
            .map_err(|_| Error::Timeout(duration))?,
        None => call.await,
    }
}
