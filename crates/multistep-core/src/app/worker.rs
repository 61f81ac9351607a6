//! Workers - lease → execute → report loop.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::coordinator::Coordinator;
use crate::ports::{Delivery, QueueError};

/// Worker group handle.
/// - `request_shutdown()` stops every worker from taking new units
/// - `shutdown_and_join()` also waits for in-flight units to finish
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers leasing from the coordinator's queue.
    pub fn spawn(n: usize, coordinator: Coordinator) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let coordinator = coordinator.clone();
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, coordinator, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Does not cancel units already running; workers just stop leasing.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    coordinator: Coordinator,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease waits for work, so race it against shutdown
        let leased = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            leased = coordinator.queue().lease() => leased,
        };

        let delivery = match leased {
            Ok(delivery) => delivery,
            Err(err) => {
                warn!(worker_id, error = %err, "lease failed");
                tokio::task::yield_now().await;
                continue;
            }
        };

        if let Err(err) = process(&coordinator, delivery).await {
            warn!(worker_id, error = %err, "failure report failed");
        }
    }
    debug!(worker_id, "worker stopped");
}

/// Execute one delivery; a failed unit is handed back to the queue's
/// failure list. Returns `Ok(false)` if the unit failed.
async fn process(coordinator: &Coordinator, delivery: Delivery) -> Result<bool, QueueError> {
    debug!(
        queue = %delivery.queue,
        kind = delivery.unit.kind(),
        attempt = delivery.attempt,
        "executing unit"
    );

    match coordinator.execute_unit(delivery.unit.clone()).await {
        Ok(()) => Ok(true),
        Err(err) => {
            coordinator.queue().fail(delivery, err.to_string()).await?;
            Ok(false)
        }
    }
}

/// Outcome of [`drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub failed: usize,
}

/// Process queued units on the current task until every queue is empty.
///
/// Units queued while draining are processed too. Deterministic, so tests
/// and the demo use it instead of a [`WorkerGroup`].
pub async fn drain(coordinator: &Coordinator) -> Result<DrainReport, QueueError> {
    let mut report = DrainReport::default();
    while let Some(delivery) = coordinator.queue().try_lease().await? {
        report.processed += 1;
        if !process(coordinator, delivery).await? {
            report.failed += 1;
        }
    }
    Ok(report)
}
