//! MultiStepTask - handle to one task.
//!
//! The handle holds no state of its own besides the id; everything lives in
//! the shared store under the task's namespace, so any number of handles in
//! any number of processes can point at the same task.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::coordinator::Coordinator;
use crate::domain::{JobSpec, TaskId, WorkUnit};
use crate::error::{Result, TaskError};
use crate::ports::Namespace;
use crate::typed::{Job, encode_args};

pub(crate) const IS_FINALIZABLE: &str = "is_finalizable";
const FINALIZE_JOBS: &str = "finalize_jobs";
const CREATED_AT: &str = "created_at";

#[derive(Clone)]
pub struct MultiStepTask {
    task_id: TaskId,
    coordinator: Coordinator,
    ns: Namespace,
}

impl MultiStepTask {
    /// Only the coordinator hands out handles (`create` / `find`).
    pub(crate) fn new(task_id: TaskId, coordinator: Coordinator) -> Self {
        let ns = coordinator.task_namespace(&task_id);
        Self {
            task_id,
            coordinator,
            ns,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Every task gets its own queue, named after its id.
    pub fn queue_name(&self) -> &str {
        self.task_id.as_str()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub(crate) fn ns(&self) -> &Namespace {
        &self.ns
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Add a normal job.
    ///
    /// In sync mode the job runs before this returns and its failure is
    /// returned here; in async mode it is queued on the task's queue.
    pub async fn add_job<J: Job>(&self, args: J::Args) -> Result<()> {
        self.add_job_spec(JobSpec::new(J::TYPE, encode_args(&args)?))
            .await
    }

    pub async fn add_job_spec(&self, job: JobSpec) -> Result<()> {
        self.increment_normal_job_count().await?;

        if self.coordinator.is_synchronous() {
            self.coordinator.perform(&self.task_id, job).await
        } else {
            let unit = WorkUnit::Normal {
                task_id: self.task_id.clone(),
                job,
            };
            self.coordinator.enqueue(self, unit).await
        }
    }

    /// Append a job to the finalization chain. Never runs it immediately.
    pub async fn add_finalization_job<J: Job>(&self, args: J::Args) -> Result<()> {
        self.add_finalization_job_spec(JobSpec::new(J::TYPE, encode_args(&args)?))
            .await
    }

    pub async fn add_finalization_job_spec(&self, job: JobSpec) -> Result<()> {
        self.increment_finalize_job_count().await?;
        let len = self.ns.list_push(FINALIZE_JOBS, &job.encode()?).await?;
        debug!(task_id = %self.task_id, job_type = %job.job_type, position = len, "added finalization job");
        Ok(())
    }

    /// Finalization jobs not yet started, in the order they will run.
    pub async fn finalization_jobs(&self) -> Result<Vec<JobSpec>> {
        self.ns
            .list_range(FINALIZE_JOBS)
            .await?
            .iter()
            .map(|raw| JobSpec::decode(raw).map_err(TaskError::from))
            .collect()
    }

    pub(crate) async fn pop_finalization_job(&self) -> Result<Option<JobSpec>> {
        match self.ns.list_pop(FINALIZE_JOBS).await? {
            Some(raw) => Ok(Some(JobSpec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn apply(&self, plan: TaskPlan) -> Result<()> {
        for step in plan.into_steps()? {
            match step {
                PlannedJob::Normal(job) => self.add_job_spec(job).await?,
                PlannedJob::Finalization(job) => self.add_finalization_job_spec(job).await?,
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // State
    // ---------------------------------------------------------------------

    pub async fn total_job_count(&self) -> Result<i64> {
        Ok(self.normal_job_count().await? + self.finalize_job_count().await?)
    }

    pub async fn is_finalizable(&self) -> Result<bool> {
        Ok(self.ns.exists(IS_FINALIZABLE).await?)
    }

    /// Marked finalizable and every normal job has completed.
    pub async fn ready_for_finalization(&self) -> Result<bool> {
        Ok(self.is_finalizable().await?
            && self.completed_count().await? >= self.normal_job_count().await?)
    }

    /// A normal job failed and has not been retried successfully yet.
    ///
    /// `failed_count` never goes down, so a successful retry clears this by
    /// bringing `completed_count` up to `normal_job_count`.
    pub async fn incomplete_because_of_errors(&self) -> Result<bool> {
        Ok(self.failed_count().await? > 0
            && self.completed_count().await? < self.normal_job_count().await?)
    }

    /// Like [`incomplete_because_of_errors`](Self::incomplete_because_of_errors),
    /// but also counts finalization jobs.
    pub async fn unfinalized_because_of_errors(&self) -> Result<bool> {
        Ok(self.failed_count().await? > 0
            && self.completed_count().await? < self.total_job_count().await?)
    }

    pub async fn created_at(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.ns.get(CREATED_AT).await? else {
            return Ok(None);
        };
        Ok(DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|at| at.with_timezone(&Utc)))
    }

    pub(crate) async fn record_created_at(&self) -> Result<()> {
        let now = self.coordinator.clock().now();
        self.ns.set(CREATED_AT, &now.to_rfc3339()).await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Cleanup
    // ---------------------------------------------------------------------

    /// Remove everything belonging to this task: its entry in the active
    /// set, its keys, and its queue.
    ///
    /// The task leaves the active set before its keys go, so a caller that
    /// claims the `lock` key after the wipe still sees the task as inactive.
    pub(crate) async fn nuke(&self) -> Result<()> {
        self.coordinator.deactivate(&self.task_id).await?;
        let removed = self.ns.clear().await?;
        self.coordinator
            .queue()
            .remove_queue(self.queue_name())
            .await?;
        debug!(task_id = %self.task_id, keys = removed, "nuked task state");
        Ok(())
    }

    /// The finalization chain drained: log and clean up.
    pub(crate) async fn finish(&self) -> Result<()> {
        let finished_at = self.coordinator.clock().now();
        let elapsed_ms = self
            .created_at()
            .await?
            .map(|created| (finished_at - created).num_milliseconds());
        let completed = self.completed_count().await?;
        let failed = self.failed_count().await?;

        self.nuke().await?;

        info!(
            task_id = %self.task_id,
            completed,
            failed,
            elapsed_ms,
            "multi-step task finished"
        );
        Ok(())
    }
}

impl std::fmt::Debug for MultiStepTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiStepTask")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

/// Jobs recorded by the block passed to [`Coordinator::create_with`].
///
/// ```ignore
/// coordinator.create_with(Some("nightly"), |plan| {
///     plan.add_job::<Resize>(("a.png".into(), 64));
///     plan.add_finalization_job::<Publish>(());
/// }).await?;
/// ```
#[derive(Debug, Default)]
pub struct TaskPlan {
    steps: Vec<PlannedJob>,
    error: Option<serde_json::Error>,
}

#[derive(Debug)]
enum PlannedJob {
    Normal(JobSpec),
    Finalization(JobSpec),
}

impl TaskPlan {
    pub fn add_job<J: Job>(&mut self, args: J::Args) -> &mut Self {
        match encode_args(&args) {
            Ok(args) => self.add_job_spec(JobSpec::new(J::TYPE, args)),
            Err(err) => self.record_error(err),
        }
    }

    pub fn add_job_spec(&mut self, job: JobSpec) -> &mut Self {
        self.steps.push(PlannedJob::Normal(job));
        self
    }

    pub fn add_finalization_job<J: Job>(&mut self, args: J::Args) -> &mut Self {
        match encode_args(&args) {
            Ok(args) => self.add_finalization_job_spec(JobSpec::new(J::TYPE, args)),
            Err(err) => self.record_error(err),
        }
    }

    pub fn add_finalization_job_spec(&mut self, job: JobSpec) -> &mut Self {
        self.steps.push(PlannedJob::Finalization(job));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn record_error(&mut self, err: serde_json::Error) -> &mut Self {
        // keep the first one
        self.error.get_or_insert(err);
        self
    }

    fn into_steps(self) -> Result<Vec<PlannedJob>> {
        match self.error {
            Some(err) => Err(TaskError::Codec(err)),
            None => Ok(self.steps),
        }
    }
}
