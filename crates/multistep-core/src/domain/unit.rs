//! Units of work placed on a task's queue.

use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::job::JobSpec;

/// Everything the coordinator ever enqueues.
///
/// A unit is self-contained: a worker that leases it needs nothing else to
/// execute it except access to the shared store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkUnit {
    /// A fan-out job.
    Normal { task_id: TaskId, job: JobSpec },

    /// One step of the finalization chain.
    Finalization { task_id: TaskId, job: JobSpec },

    /// Re-checks the barrier after the task became finalizable.
    AssureFinalization { task_id: TaskId },
}

impl WorkUnit {
    pub fn task_id(&self) -> &TaskId {
        match self {
            WorkUnit::Normal { task_id, .. }
            | WorkUnit::Finalization { task_id, .. }
            | WorkUnit::AssureFinalization { task_id } => task_id,
        }
    }

    pub fn job(&self) -> Option<&JobSpec> {
        match self {
            WorkUnit::Normal { job, .. } | WorkUnit::Finalization { job, .. } => Some(job),
            WorkUnit::AssureFinalization { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkUnit::Normal { .. } => "normal",
            WorkUnit::Finalization { .. } => "finalization",
            WorkUnit::AssureFinalization { .. } => "assure_finalization",
        }
    }
}
