//! Job trait - ジョブ本体の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`) and associated types (`type Args`)
//! - Type erasure パターン (TypedJob<J> → DynJob)

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::app::MultiStepTask;
use crate::domain::TaskId;
use crate::error::JobError;

/// Handed to every job and hook while it runs.
///
/// Gives the job a way back to the task it belongs to, e.g. to read its
/// counters or add more finalization jobs.
#[derive(Debug, Clone)]
pub struct JobContext {
    task: MultiStepTask,
}

impl JobContext {
    pub(crate) fn new(task: MultiStepTask) -> Self {
        Self { task }
    }

    pub fn task(&self) -> &MultiStepTask {
        &self.task
    }

    pub fn task_id(&self) -> &TaskId {
        self.task.task_id()
    }
}

/// A job type.
///
/// # 使用例
/// ```ignore
/// struct Resize;
///
/// #[async_trait]
/// impl Job for Resize {
///     const TYPE: &'static str = "images.resize";
///     type Args = (String, u32);
///
///     async fn perform(&self, ctx: &JobContext, (path, width): Self::Args) -> Result<(), JobError> {
///         ...
///     }
/// }
/// ```
///
/// Arguments travel as a positional JSON list, so `Args` is normally a tuple.
/// `()` means no arguments; a single non-tuple value is accepted as a
/// one-element list.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Name the job is registered and queued under.
    const TYPE: &'static str;

    type Args: Serialize + DeserializeOwned + Send;

    async fn perform(&self, ctx: &JobContext, args: Self::Args) -> Result<(), JobError>;
}

/// Object-safe form of a job, stored in the registry.
#[async_trait]
pub trait DynJob: Send + Sync {
    fn job_type(&self) -> &str;

    async fn execute(&self, ctx: &JobContext, args: &[Value]) -> Result<(), JobError>;
}

pub struct TypedJob<J: Job> {
    job: J,
    _marker: PhantomData<fn() -> J>,
}

impl<J: Job> TypedJob<J> {
    pub fn new(job: J) -> Self {
        Self {
            job,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<J: Job> DynJob for TypedJob<J> {
    fn job_type(&self) -> &str {
        J::TYPE
    }

    async fn execute(&self, ctx: &JobContext, args: &[Value]) -> Result<(), JobError> {
        let args: J::Args = decode_args(args)?;
        self.job.perform(ctx, args).await
    }
}

/// Turn typed arguments into the positional list that gets queued.
pub fn encode_args<A: Serialize>(args: &A) -> Result<Vec<Value>, serde_json::Error> {
    Ok(match serde_json::to_value(args)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

/// Inverse of [`encode_args`].
pub fn decode_args<A: DeserializeOwned>(args: &[Value]) -> Result<A, serde_json::Error> {
    match serde_json::from_value(Value::Array(args.to_vec())) {
        Ok(decoded) => Ok(decoded),
        Err(err) => match args {
            [] => serde_json::from_value(Value::Null).map_err(|_| err),
            [single] => serde_json::from_value(single.clone()).map_err(|_| err),
            _ => Err(err),
        },
    }
}
