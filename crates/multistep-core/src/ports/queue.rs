//! WorkQueue port - 名前付きキュー（Resque / Redis または InMemory）
//!
//! The queue owns delivery and failure bookkeeping. The coordinator only
//! enqueues units, removes a task's queue once the task is done, and reports
//! failed deliveries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::WorkUnit;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue operation failed: {0}")]
    OperationFailed(String),

    #[error("no failed unit at index {0}")]
    NoSuchFailure(usize),
}

/// A unit handed to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub queue: String,
    pub unit: WorkUnit,
    /// 1 on first delivery, bumped on every explicit retry.
    pub attempt: u32,
}

/// An entry on the failure surface.
#[derive(Debug, Clone)]
pub struct FailedUnit {
    pub delivery: Delivery,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Queue port.
///
/// # 設計原則
/// - at-least-once delivery, no ordering across queues
/// - failures are recorded for inspection and manual retry, never retried here
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Place a unit on the named queue, creating the queue if needed.
    async fn enqueue(&self, queue: &str, unit: WorkUnit) -> Result<(), QueueError>;

    /// Wait for the next unit on any queue.
    async fn lease(&self) -> Result<Delivery, QueueError>;

    /// Take the next unit on any queue without waiting.
    async fn try_lease(&self) -> Result<Option<Delivery>, QueueError>;

    /// Record a failed delivery.
    async fn fail(&self, delivery: Delivery, error: String) -> Result<(), QueueError>;

    /// Drop a queue and everything still waiting on it.
    async fn remove_queue(&self, queue: &str) -> Result<(), QueueError>;
}
