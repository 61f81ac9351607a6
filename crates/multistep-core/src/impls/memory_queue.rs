//! InMemoryWorkQueue - 開発用のワークキュー
//!
//! Queues are kept by name in a `BTreeMap`, so workers drain them in name
//! order like a Resque worker started with `QUEUES=*`. Failed deliveries go
//! to a failure list and stay there until someone requeues them.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};

use crate::domain::WorkUnit;
use crate::ports::{Delivery, FailedUnit, QueueError, WorkQueue};

#[derive(Default)]
struct QueueState {
    queues: BTreeMap<String, VecDeque<Delivery>>,
    failures: Vec<FailedUnit>,
}

impl QueueState {
    fn next_delivery(&mut self) -> Option<Delivery> {
        self.queues
            .values_mut()
            .find(|pending| !pending.is_empty())
            .and_then(VecDeque::pop_front)
    }
}

pub struct InMemoryWorkQueue {
    state: Mutex<QueueState>,
    notify: Arc<Notify>,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Names of queues that currently exist (possibly empty).
    pub async fn queue_names(&self) -> Vec<String> {
        self.state.lock().await.queues.keys().cloned().collect()
    }

    pub async fn has_queue(&self, queue: &str) -> bool {
        self.state.lock().await.queues.contains_key(queue)
    }

    pub async fn queue_len(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Units waiting on a queue, head first.
    pub async fn peek(&self, queue: &str) -> Vec<WorkUnit> {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|pending| pending.iter().map(|d| d.unit.clone()).collect())
            .unwrap_or_default()
    }

    /// Units waiting across every queue.
    pub async fn pending(&self) -> usize {
        self.state.lock().await.queues.values().map(VecDeque::len).sum()
    }

    pub async fn failures(&self) -> Vec<FailedUnit> {
        self.state.lock().await.failures.clone()
    }

    pub async fn failure_count(&self) -> usize {
        self.state.lock().await.failures.len()
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    /// Put a failed unit back on its queue for another attempt.
    pub async fn requeue_failure(&self, index: usize) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            if index >= state.failures.len() {
                return Err(QueueError::NoSuchFailure(index));
            }
            let failed = state.failures.remove(index);
            let mut delivery = failed.delivery;
            delivery.attempt += 1;
            tracing::debug!(
                queue = %delivery.queue,
                attempt = delivery.attempt,
                "requeueing failed unit"
            );
            state
                .queues
                .entry(delivery.queue.clone())
                .or_default()
                .push_back(delivery);
        }
        self.notify.notify_one();
        Ok(())
    }
}

impl Default for InMemoryWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, queue: &str, unit: WorkUnit) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            state
                .queues
                .entry(queue.to_string())
                .or_default()
                .push_back(Delivery {
                    queue: queue.to_string(),
                    unit,
                    attempt: 1,
                });
        }
        // notify outside the lock
        self.notify.notify_one();
        Ok(())
    }

    async fn lease(&self) -> Result<Delivery, QueueError> {
        loop {
            if let Some(delivery) = self.state.lock().await.next_delivery() {
                return Ok(delivery);
            }
            self.notify.notified().await;
        }
    }

    async fn try_lease(&self) -> Result<Option<Delivery>, QueueError> {
        Ok(self.state.lock().await.next_delivery())
    }

    async fn fail(&self, delivery: Delivery, error: String) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.failures.push(FailedUnit {
            delivery,
            error,
            failed_at: Utc::now(),
        });
        Ok(())
    }

    async fn remove_queue(&self, queue: &str) -> Result<(), QueueError> {
        self.state.lock().await.queues.remove(queue);
        Ok(())
    }
}
