//! Coordinator - task registry and queue entry points.
//!
//! One `Coordinator` per process. It is cheap to clone; every clone shares
//! the same store, queue, and job registry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::config::CoordinatorConfig;
use super::task::{MultiStepTask, TaskPlan};
use crate::domain::{JobSpec, TaskId, WorkUnit};
use crate::error::{Result, TaskError};
use crate::ports::{Clock, Namespace, SharedStore, WorkQueue};
use crate::typed::{JobContext, JobRegistry};

/// Key of the store-wide set of active task ids.
const ACTIVE_TASKS: &str = "active-tasks";

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: CoordinatorConfig,
    store: Arc<dyn SharedStore>,
    queue: Arc<dyn WorkQueue>,
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
    global: Namespace,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn SharedStore>,
        queue: Arc<dyn WorkQueue>,
        registry: Arc<JobRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let global = Namespace::new(Arc::clone(&store), config.namespace.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                queue,
                registry,
                clock,
                global,
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn is_synchronous(&self) -> bool {
        self.inner.config.is_synchronous()
    }

    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.inner.store
    }

    pub fn queue(&self) -> &Arc<dyn WorkQueue> {
        &self.inner.queue
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.inner.registry
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// Keys of one task live under `<namespace>:<task_id>`.
    pub(crate) fn task_namespace(&self, task_id: &TaskId) -> Namespace {
        self.inner.global.child(task_id.as_str())
    }

    // ---------------------------------------------------------------------
    // Identity & registry
    // ---------------------------------------------------------------------

    /// Start a new task.
    ///
    /// Any state left under the same id is wiped first. The task is not
    /// finalizable until [`MultiStepTask::finalizable`] is called.
    pub async fn create(&self, slug: Option<&str>) -> Result<MultiStepTask> {
        let task_id = TaskId::generate(slug, &self.inner.config.default_slug);
        self.create_with_id(task_id).await
    }

    /// Start a task under a known id, wiping whatever an earlier task with
    /// the same id left behind.
    pub(crate) async fn create_with_id(&self, task_id: TaskId) -> Result<MultiStepTask> {
        let task = MultiStepTask::new(task_id, self.clone());

        task.nuke().await?;
        self.inner
            .global
            .set_add(ACTIVE_TASKS, task.task_id().as_str())
            .await?;
        task.record_created_at().await?;

        info!(task_id = %task.task_id(), mode = %self.inner.config.mode, "created multi-step task");
        Ok(task)
    }

    /// Start a new task, register its jobs, and mark it finalizable.
    ///
    /// Registrations are applied in the order `configure` recorded them.
    pub async fn create_with<F>(&self, slug: Option<&str>, configure: F) -> Result<MultiStepTask>
    where
        F: FnOnce(&mut TaskPlan),
    {
        let mut plan = TaskPlan::default();
        configure(&mut plan);

        let task = self.create(slug).await?;
        task.apply(plan).await?;
        task.finalizable().await?;
        Ok(task)
    }

    /// Handle to an active task.
    pub async fn find(&self, task_id: &TaskId) -> Result<MultiStepTask> {
        if !self.is_active(task_id).await? {
            return Err(TaskError::NoSuchTask(task_id.clone()));
        }
        Ok(MultiStepTask::new(task_id.clone(), self.clone()))
    }

    pub async fn is_active(&self, task_id: &TaskId) -> Result<bool> {
        Ok(self
            .inner
            .global
            .set_is_member(ACTIVE_TASKS, task_id.as_str())
            .await?)
    }

    pub async fn active_task_ids(&self) -> Result<Vec<TaskId>> {
        let members = self.inner.global.set_members(ACTIVE_TASKS).await?;
        Ok(members.into_iter().map(TaskId::from).collect())
    }

    pub(crate) async fn deactivate(&self, task_id: &TaskId) -> Result<()> {
        self.inner
            .global
            .set_remove(ACTIVE_TASKS, task_id.as_str())
            .await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Queue entry points
    // ---------------------------------------------------------------------

    /// Run one queued unit. This is what a worker calls after leasing it.
    pub async fn execute_unit(&self, unit: WorkUnit) -> Result<()> {
        match unit {
            WorkUnit::Normal { task_id, job } => self.perform(&task_id, job).await,
            WorkUnit::Finalization { task_id, job } => {
                self.perform_finalization(&task_id, job).await
            }
            WorkUnit::AssureFinalization { task_id } => self.assure_finalization(&task_id).await,
        }
    }

    /// Run a normal job.
    ///
    /// Success bumps `completed_count` and re-checks the barrier. Failure
    /// bumps `failed_count` and is returned so the queue records it.
    pub async fn perform(&self, task_id: &TaskId, job: JobSpec) -> Result<()> {
        let task = self.find(task_id).await?;

        match self.run_job(&task, &job).await {
            Ok(()) => {
                let completed = task.increment_completed_count().await?;
                info!(
                    task_id = %task_id,
                    job_type = %job.job_type,
                    completed,
                    "incrementing completed_count: normal job completed"
                );
            }
            Err(err) => {
                let failed = task.increment_failed_count().await?;
                warn!(
                    task_id = %task_id,
                    job_type = %job.job_type,
                    failed,
                    error = %err,
                    "incrementing failed_count: normal job failed"
                );
                return Err(err);
            }
        }

        task.maybe_finalize().await
    }

    /// Safety net queued by `finalizable()`.
    ///
    /// A task that is already gone has finished finalizing, so there is
    /// nothing left to check.
    pub async fn assure_finalization(&self, task_id: &TaskId) -> Result<()> {
        match self.find(task_id).await {
            Ok(task) => task.maybe_finalize().await,
            Err(TaskError::NoSuchTask(_)) => {
                debug!(task_id = %task_id, "assure finalization: task already finished");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn enqueue(&self, task: &MultiStepTask, unit: WorkUnit) -> Result<()> {
        debug!(task_id = %task.task_id(), kind = unit.kind(), "enqueueing unit");
        self.inner.queue.enqueue(task.queue_name(), unit).await?;
        Ok(())
    }

    /// Resolve `job` in the registry and run it with its hooks.
    pub(crate) async fn run_job(&self, task: &MultiStepTask, job: &JobSpec) -> Result<()> {
        let registered = self
            .inner
            .registry
            .get(&job.job_type)
            .ok_or_else(|| TaskError::UnknownJobType(job.job_type.clone()))?;

        let ctx = JobContext::new(task.clone());
        registered.execute(&ctx, &job.args).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}
