//! App - アプリケーション層
//!
//! # 主要コンポーネント
//! - **CoordinatorBuilder**: wiring and start-up validation
//! - **Coordinator**: task registry, job dispatch, queue entry points
//! - **MultiStepTask**: handle to one task (counters, barrier, dispatch)
//! - **chain**: sequential finalization runner
//! - **WorkerGroup**: lease → execute → report loop

pub mod builder;
pub mod config;
pub mod coordinator;
pub mod task;
pub mod worker;

mod barrier;
mod chain;
mod counters;

pub use self::builder::{BuildError, CoordinatorBuilder};
pub use self::chain::ChainState;
pub use self::config::{ConfigError, CoordinatorConfig, ExecutionMode};
pub use self::coordinator::Coordinator;
pub use self::task::{MultiStepTask, TaskPlan};
pub use self::worker::{DrainReport, WorkerGroup, drain};
