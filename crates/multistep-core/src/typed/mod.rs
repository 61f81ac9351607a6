//! Typed - 型付き Job API
//!
//! # 二層構造
//! - **表層（Typed）**: `Job` trait - job type name and argument types are static
//! - **内部（Dyn）**: `DynJob` trait - object-safe, takes the raw argument list
//!
//! Jobs are looked up by name in a `JobRegistry` built at startup, together
//! with the `HookSet` that wraps their execution.

pub mod hooks;
pub mod job;
pub mod registry;

pub use self::hooks::{AroundHook, FailureHook, FnHook, Hook, HookSet, Next};
pub use self::job::{DynJob, Job, JobContext, TypedJob, decode_args, encode_args};
pub use self::registry::{JobRegistry, RegisteredJob, RegistryError};
