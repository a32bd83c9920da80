//! In-memory progress registry
//!
//! Instant-based TTL expiry plus a tokio broadcast channel standing in for
//! Redis pub/sub. Single-process only; used by tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::backend::ProgressBackend;
use super::error::ProgressError;

/// Default broadcast channel capacity
const BROADCAST_CAPACITY: usize = 1024;

enum Record {
    Float(f64),
    Counter(i64),
}

struct Entry {
    record: Record,
    expires_at: Instant,
}

struct SharedState {
    records: RwLock<HashMap<String, Entry>>,
    channels: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,
}

/// In-memory progress registry
#[derive(Clone)]
pub struct MemoryProgress {
    state: Arc<SharedState>,
}

impl Default for MemoryProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SharedState {
                records: RwLock::new(HashMap::new()),
                channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to a pub/sub channel (test helper)
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Vec<u8>> {
        self.get_or_create_channel(channel).subscribe()
    }

    fn get_or_create_channel(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        {
            let channels = self.state.channels.read().expect("channels lock poisoned");
            if let Some(sender) = channels.get(channel) {
                return sender.clone();
            }
        }
        let mut channels = self.state.channels.write().expect("channels lock poisoned");
        if let Some(sender) = channels.get(channel) {
            return sender.clone();
        }
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        channels.insert(channel.to_string(), sender.clone());
        sender
    }

    fn live_entry<R>(
        &self,
        key: &str,
        read: impl FnOnce(&Record) -> R,
    ) -> Option<R> {
        let records = self.state.records.read().expect("records lock poisoned");
        let entry = records.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(read(&entry.record))
    }
}

#[async_trait]
impl ProgressBackend for MemoryProgress {
    async fn set(&self, key: &str, value: f64, ttl: Duration) -> Result<(), ProgressError> {
        self.state
            .records
            .write()
            .expect("records lock poisoned")
            .insert(
                key.to_string(),
                Entry {
                    record: Record::Float(value),
                    expires_at: Instant::now() + ttl,
                },
            );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<f64>, ProgressError> {
        Ok(self
            .live_entry(key, |record| match record {
                Record::Float(v) => Some(*v),
                Record::Counter(c) => Some(*c as f64),
            })
            .flatten())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, ProgressError> {
        let mut records = self.state.records.write().expect("records lock poisoned");
        let now = Instant::now();

        let current = match records.get(key) {
            Some(entry) if entry.expires_at > now => match entry.record {
                Record::Counter(c) => c,
                Record::Float(_) => 0,
            },
            _ => 0,
        };

        let next = current + 1;
        records.insert(
            key.to_string(),
            Entry {
                record: Record::Counter(next),
                expires_at: now + ttl,
            },
        );
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<(), ProgressError> {
        self.state
            .records
            .write()
            .expect("records lock poisoned")
            .remove(key);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), ProgressError> {
        // Send errors mean no active subscribers, which is fine for
        // fire-and-forget notifications
        let _ = self.get_or_create_channel(channel).send(payload.to_vec());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProgressError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
