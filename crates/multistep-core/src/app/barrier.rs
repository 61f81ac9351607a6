//! Completion barrier and finalizer lease.
//!
//! A task may start its finalization chain once it is finalizable and every
//! normal job has completed. Several workers can observe that at the same
//! moment; the `lock` key, claimed with set-if-absent, lets exactly one of them
//! start the chain.

use tracing::{debug, info};

use super::task::{IS_FINALIZABLE, MultiStepTask};
use crate::domain::WorkUnit;
use crate::error::{Result, TaskError};

const LOCK: &str = "lock";

impl MultiStepTask {
    /// Mark the task finalizable. Calling it again has no further effect.
    ///
    /// Sync mode checks the barrier right away and may run the whole
    /// finalization chain inline; see [`finalize`](Self::finalize) for what a
    /// failing finalization job leaves behind. Async mode queues a safety
    /// net unit instead, so a task whose normal jobs all finished before this
    /// call still gets finalized.
    pub async fn finalizable(&self) -> Result<()> {
        if !self.coordinator().is_active(self.task_id()).await? {
            debug!(task_id = %self.task_id(), "finalizable on a finished task");
            return Ok(());
        }
        self.ns().set(IS_FINALIZABLE, "true").await?;

        if self.coordinator().is_synchronous() {
            self.maybe_finalize().await
        } else {
            let unit = WorkUnit::AssureFinalization {
                task_id: self.task_id().clone(),
            };
            self.coordinator().enqueue(self, unit).await
        }
    }

    /// Claim the finalizer lease and start the chain.
    ///
    /// In sync mode the chain runs before this returns. A finalization job
    /// that fails there has already been taken off the list, so its error is
    /// returned, the lease stays held, and the task cannot be resumed.
    ///
    /// # Errors
    /// - [`TaskError::NotReady`] if the barrier has not been reached
    /// - [`TaskError::AlreadyFinalizing`] if another caller holds the lease,
    ///   or the task has already been finalized and removed
    pub async fn finalize(&self) -> Result<()> {
        if !self.coordinator().is_active(self.task_id()).await? {
            return Err(TaskError::AlreadyFinalizing(self.task_id().clone()));
        }

        if !self.ready_for_finalization().await? || self.incomplete_because_of_errors().await? {
            // a concurrent finisher may have just nuked the counters
            if !self.coordinator().is_active(self.task_id()).await? {
                return Err(TaskError::AlreadyFinalizing(self.task_id().clone()));
            }
            return Err(self.not_ready().await?);
        }

        let stamp = self.coordinator().clock().now().to_rfc3339();
        if !self.ns().set_if_absent(LOCK, &stamp).await? {
            return Err(TaskError::AlreadyFinalizing(self.task_id().clone()));
        }
        // the previous holder may have finished and wiped the task between
        // our checks and the claim
        if !self.coordinator().is_active(self.task_id()).await? {
            self.ns().delete(LOCK).await?;
            debug!(task_id = %self.task_id(), "lease claimed on a finished task, released");
            return Err(TaskError::AlreadyFinalizing(self.task_id().clone()));
        }

        let finalize_jobs = self.finalize_job_count().await?;
        info!(task_id = %self.task_id(), finalize_jobs, "starting finalization");

        if self.coordinator().is_synchronous() {
            self.coordinator().drain_chain(self).await
        } else {
            self.coordinator().start_chain(self).await
        }
    }

    /// [`finalize`](Self::finalize) if the barrier is reached; losing the
    /// lease race is not an error here.
    pub async fn maybe_finalize(&self) -> Result<()> {
        if !self.ready_for_finalization().await? || self.incomplete_because_of_errors().await? {
            return Ok(());
        }

        match self.finalize().await {
            Err(TaskError::AlreadyFinalizing(task_id)) => {
                debug!(task_id = %task_id, "finalization already claimed elsewhere");
                Ok(())
            }
            other => other,
        }
    }

    async fn not_ready(&self) -> Result<TaskError> {
        Ok(TaskError::NotReady {
            task_id: self.task_id().clone(),
            finalizable: self.is_finalizable().await?,
            normal_job_count: self.normal_job_count().await?,
            completed_count: self.completed_count().await?,
            failed_count: self.failed_count().await?,
        })
    }
}
