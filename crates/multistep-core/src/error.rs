use thiserror::Error;

use crate::domain::TaskId;
use crate::ports::{QueueError, StoreError};

pub type Result<T, E = TaskError> = std::result::Result<T, E>;

/// Failure raised by a job body or one of its hooks.
///
/// The coordinator treats it as opaque: it is counted, logged, and handed
/// back to the queue's failure surface.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct JobError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for JobError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for JobError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(format!("json decode: {err}"), err)
    }
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        Self::with_source(err.to_string(), err)
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("no such multi-step task: {0}")]
    NoSuchTask(TaskId),

    #[error(
        "task {task_id} is not ready for finalization \
         (finalizable={finalizable} normal={normal_job_count} \
         completed={completed_count} failed={failed_count})"
    )]
    NotReady {
        task_id: TaskId,
        finalizable: bool,
        normal_job_count: i64,
        completed_count: i64,
        failed_count: i64,
    },

    #[error("finalization already begun for task {0}")]
    AlreadyFinalizing(TaskId),

    #[error("no job registered for job_type={0}")]
    UnknownJobType(String),

    #[error("job failed: {0}")]
    Job(#[from] JobError),

    #[error("job spec codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl TaskError {
    /// Did the job (or a hook) itself fail, as opposed to the coordination layer?
    pub fn is_job_failure(&self) -> bool {
        matches!(self, TaskError::Job(_) | TaskError::UnknownJobType(_))
    }
}
