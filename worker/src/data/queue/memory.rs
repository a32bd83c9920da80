//! In-memory queue backend
//!
//! Ready/delayed/in-flight bookkeeping with Instant-based promotion,
//! mirroring SQS semantics closely enough for tests: delayed messages become
//! receivable once their delay passes, and unacked in-flight messages are
//! redelivered after the visibility timeout.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::backend::{QueueBackend, QueueTarget, ReceivedMessage};
use super::error::QueueError;

/// Poll granularity while waiting inside `receive`
const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct QueueState {
    ready: VecDeque<String>,
    delayed: Vec<(Instant, String)>,
    inflight: HashMap<String, (Instant, String)>,
    next_receipt: u64,
    acked: u64,
}

impl QueueState {
    /// Move due delayed messages and expired in-flight messages back to ready
    fn promote(&mut self, now: Instant) {
        let mut due = Vec::new();
        self.delayed.retain(|(at, body)| {
            if *at <= now {
                due.push(body.clone());
                false
            } else {
                true
            }
        });
        for body in due {
            self.ready.push_back(body);
        }

        let expired: Vec<String> = self
            .inflight
            .iter()
            .filter(|(_, (visible_at, _))| *visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some((_, body)) = self.inflight.remove(&receipt) {
                self.ready.push_back(body);
            }
        }
    }
}

struct SharedState {
    processing: Mutex<QueueState>,
    indexing: Mutex<QueueState>,
}

/// In-memory queue backend
#[derive(Clone)]
pub struct MemoryQueue {
    state: Arc<SharedState>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SharedState {
                processing: Mutex::new(QueueState::default()),
                indexing: Mutex::new(QueueState::default()),
            }),
        }
    }

    fn queue(&self, target: QueueTarget) -> &Mutex<QueueState> {
        match target {
            QueueTarget::Processing => &self.state.processing,
            QueueTarget::Indexing => &self.state.indexing,
        }
    }

    /// Messages currently receivable, due-delayed included (test helper)
    pub fn ready_len(&self, target: QueueTarget) -> usize {
        let mut state = self.queue(target).lock().expect("queue lock poisoned");
        state.promote(Instant::now());
        state.ready.len()
    }

    /// Snapshot of receivable message bodies (test helper)
    pub fn ready_bodies(&self, target: QueueTarget) -> Vec<String> {
        let mut state = self.queue(target).lock().expect("queue lock poisoned");
        state.promote(Instant::now());
        state.ready.iter().cloned().collect()
    }

    /// Messages scheduled for later delivery (test helper)
    pub fn delayed_len(&self, target: QueueTarget) -> usize {
        self.queue(target)
            .lock()
            .expect("queue lock poisoned")
            .delayed
            .len()
    }

    /// Total acknowledged messages (test helper)
    pub fn acked_count(&self, target: QueueTarget) -> u64 {
        self.queue(target)
            .lock()
            .expect("queue lock poisoned")
            .acked
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn receive(
        &self,
        target: QueueTarget,
        max: u32,
        wait: Duration,
        visibility: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let deadline = Instant::now() + wait;

        loop {
            {
                let mut state = self.queue(target).lock().expect("queue lock poisoned");
                let now = Instant::now();
                state.promote(now);

                if !state.ready.is_empty() {
                    let mut messages = Vec::new();
                    while messages.len() < max as usize {
                        let Some(body) = state.ready.pop_front() else {
                            break;
                        };
                        state.next_receipt += 1;
                        let receipt = format!("r-{}", state.next_receipt);
                        state
                            .inflight
                            .insert(receipt.clone(), (now + visibility, body.clone()));
                        messages.push(ReceivedMessage { body, receipt });
                    }
                    return Ok(messages);
                }
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(RECEIVE_POLL_INTERVAL).await;
        }
    }

    async fn ack(&self, target: QueueTarget, receipt: &str) -> Result<(), QueueError> {
        let mut state = self.queue(target).lock().expect("queue lock poisoned");
        if state.inflight.remove(receipt).is_none() {
            return Err(QueueError::UnknownReceipt(receipt.to_string()));
        }
        state.acked += 1;
        Ok(())
    }

    async fn send(
        &self,
        target: QueueTarget,
        body: &str,
        delay: Duration,
    ) -> Result<(), QueueError> {
        let mut state = self.queue(target).lock().expect("queue lock poisoned");
        if delay.is_zero() {
            state.ready.push_back(body.to_string());
        } else {
            state.delayed.push((Instant::now() + delay, body.to_string()));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_receive_ack() {
        let queue = MemoryQueue::new();
        queue
            .send(QueueTarget::Processing, "{}", Duration::ZERO)
            .await
            .unwrap();

        let messages = queue
            .receive(
                QueueTarget::Processing,
                1,
                Duration::from_millis(50),
                Duration::from_secs(120),
            )
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);

        queue
            .ack(QueueTarget::Processing, &messages[0].receipt)
            .await
            .unwrap();
        assert_eq!(queue.acked_count(QueueTarget::Processing), 1);
        assert_eq!(queue.ready_len(QueueTarget::Processing), 0);
    }

    #[tokio::test]
    async fn test_receive_empty_after_wait() {
        let queue = MemoryQueue::new();
        let messages = queue
            .receive(
                QueueTarget::Processing,
                1,
                Duration::from_millis(30),
                Duration::from_secs(120),
            )
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_delayed_message_promotion() {
        let queue = MemoryQueue::new();
        queue
            .send(QueueTarget::Processing, "{}", Duration::from_millis(40))
            .await
            .unwrap();

        assert_eq!(queue.ready_len(QueueTarget::Processing), 0);
        assert_eq!(queue.delayed_len(QueueTarget::Processing), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(queue.ready_len(QueueTarget::Processing), 1);
    }

    #[tokio::test]
    async fn test_visibility_timeout_redelivery() {
        let queue = MemoryQueue::new();
        queue
            .send(QueueTarget::Processing, "{}", Duration::ZERO)
            .await
            .unwrap();

        let messages = queue
            .receive(
                QueueTarget::Processing,
                1,
                Duration::from_millis(50),
                Duration::from_millis(20),
            )
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);

        // Not acked: becomes visible again once the timeout lapses
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(queue.ready_len(QueueTarget::Processing), 1);
    }

    #[tokio::test]
    async fn test_ack_unknown_receipt() {
        let queue = MemoryQueue::new();
        assert!(queue.ack(QueueTarget::Processing, "r-404").await.is_err());
    }

    #[tokio::test]
    async fn test_targets_are_independent() {
        let queue = MemoryQueue::new();
        queue
            .send(QueueTarget::Indexing, "{}", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(queue.ready_len(QueueTarget::Processing), 0);
        assert_eq!(queue.ready_len(QueueTarget::Indexing), 1);
    }
}
