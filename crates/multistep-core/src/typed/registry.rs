//! JobRegistry - job type 名から実行体への対応表
//!
//! Built once during start-up and shared read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::hooks::HookSet;
use super::job::{DynJob, Job, JobContext, TypedJob};
use crate::error::JobError;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("job type '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// A job plus the hooks that wrap it.
#[derive(Clone)]
pub struct RegisteredJob {
    job: Arc<dyn DynJob>,
    hooks: HookSet,
}

impl RegisteredJob {
    pub fn job_type(&self) -> &str {
        self.job.job_type()
    }

    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    pub async fn execute(&self, ctx: &JobContext, args: &[Value]) -> Result<(), JobError> {
        self.hooks.run(&*self.job, ctx, args).await
    }
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<String, RegisteredJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<J: Job>(&mut self, job: J) -> Result<(), RegistryError> {
        self.register_with_hooks(job, HookSet::new())
    }

    pub fn register_with_hooks<J: Job>(
        &mut self,
        job: J,
        hooks: HookSet,
    ) -> Result<(), RegistryError> {
        self.register_dyn(Arc::new(TypedJob::new(job)), hooks)
    }

    /// Register an untyped job under its own `job_type()`.
    pub fn register_dyn(
        &mut self,
        job: Arc<dyn DynJob>,
        hooks: HookSet,
    ) -> Result<(), RegistryError> {
        let job_type = job.job_type().to_string();
        if self.jobs.contains_key(&job_type) {
            return Err(RegistryError::AlreadyRegistered(job_type));
        }
        self.jobs.insert(job_type, RegisteredJob { job, hooks });
        Ok(())
    }

    pub fn get(&self, job_type: &str) -> Option<&RegisteredJob> {
        self.jobs.get(job_type)
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.jobs.contains_key(job_type)
    }

    /// Registered job type names, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.jobs.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.registered_types())
            .finish()
    }
}
