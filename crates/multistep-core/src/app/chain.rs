//! Finalization chain runner.
//!
//! Finalization jobs run one at a time in registration order. In async mode
//! each unit queues the next one only after it succeeds; in sync mode the
//! lease holder drains the whole list inline. Either way the task is removed
//! once the list is empty.

use std::fmt;

use tracing::{debug, info, warn};

use super::coordinator::Coordinator;
use super::task::MultiStepTask;
use crate::domain::{JobSpec, TaskId, WorkUnit};
use crate::error::Result;

/// Where a task's finalization chain stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Draining,
    Done,
}

impl ChainState {
    fn transition(self, to: ChainState, task_id: &TaskId) -> ChainState {
        debug!(task_id = %task_id, from = %self, to = %to, "finalization chain");
        to
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChainState::Idle => "idle",
            ChainState::Draining => "draining",
            ChainState::Done => "done",
        })
    }
}

impl Coordinator {
    /// Run one queued finalization job, then schedule the next one.
    ///
    /// A failure is counted and returned; nothing further is scheduled, so
    /// the chain resumes only when this unit is retried.
    pub async fn perform_finalization(&self, task_id: &TaskId, job: JobSpec) -> Result<()> {
        let task = self.find(task_id).await?;
        self.run_finalization_step(&task, &job).await?;
        self.start_chain(&task).await
    }

    /// Queue the next finalization job, or finish the task if none is left.
    pub(crate) async fn start_chain(&self, task: &MultiStepTask) -> Result<()> {
        match task.pop_finalization_job().await? {
            Some(job) => {
                let unit = WorkUnit::Finalization {
                    task_id: task.task_id().clone(),
                    job,
                };
                self.enqueue(task, unit).await
            }
            None => {
                ChainState::Draining.transition(ChainState::Done, task.task_id());
                task.finish().await
            }
        }
    }

    /// Run every finalization job inline, then finish the task.
    ///
    /// A failing job has already been popped, so it is not retried; the task
    /// stays active with its lease held.
    pub(crate) async fn drain_chain(&self, task: &MultiStepTask) -> Result<()> {
        let state = ChainState::Idle.transition(ChainState::Draining, task.task_id());

        while let Some(job) = task.pop_finalization_job().await? {
            self.run_finalization_step(task, &job).await?;
        }

        state.transition(ChainState::Done, task.task_id());
        task.finish().await
    }

    async fn run_finalization_step(&self, task: &MultiStepTask, job: &JobSpec) -> Result<()> {
        match self.run_job(task, job).await {
            Ok(()) => {
                let completed = task.increment_completed_count().await?;
                info!(
                    task_id = %task.task_id(),
                    job_type = %job.job_type,
                    completed,
                    "incrementing completed_count: finalization job completed"
                );
                Ok(())
            }
            Err(err) => {
                let failed = task.increment_failed_count().await?;
                warn!(
                    task_id = %task.task_id(),
                    job_type = %job.job_type,
                    failed,
                    error = %err,
                    "incrementing failed_count: finalization job failed"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ChainState::Idle, "idle")]
    #[case(ChainState::Draining, "draining")]
    #[case(ChainState::Done, "done")]
    fn chain_state_display(#[case] state: ChainState, #[case] expected: &str) {
        assert_eq!(state.to_string(), expected);
    }

    #[test]
    fn transition_returns_target_state() {
        let task_id = TaskId::from("t~AAAAA");
        assert_eq!(
            ChainState::Idle.transition(ChainState::Draining, &task_id),
            ChainState::Draining
        );
    }
}
