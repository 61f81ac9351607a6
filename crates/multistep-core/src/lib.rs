//! multistep-core
//!
//! Fan-out/fan-in coordination for jobs running on a plain work queue.
//!
//! A multi-step task groups any number of normal jobs, which run in parallel,
//! with an ordered chain of finalization jobs, which run one at a time after
//! every normal job has completed. Workers share nothing but a key-value store
//! and the queue.
//!
//! # モジュール構成
//! - **domain**: ids, job specs, queued work units, counter names
//! - **ports**: SharedStore, WorkQueue, Clock
//! - **impls**: InMemoryStore / InMemoryWorkQueue (開発・テスト用)
//! - **typed**: Job trait, hooks, JobRegistry
//! - **app**: Coordinator, MultiStepTask, finalization chain, workers

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{
    Coordinator, CoordinatorBuilder, CoordinatorConfig, ExecutionMode, MultiStepTask, TaskPlan,
    WorkerGroup,
};
pub use domain::{JobSpec, TaskId, WorkUnit};
pub use error::{JobError, Result, TaskError};
pub use typed::{HookSet, Job, JobContext, JobRegistry};
