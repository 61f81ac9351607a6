//! Domain model (ids, job specs, queued units, counters).

pub mod counter;
pub mod ids;
pub mod job;
pub mod unit;

pub use counter::Counter;
pub use ids::{DEFAULT_SLUG, NONCE_LEN, TaskId, nonce};
pub use job::JobSpec;
pub use unit::WorkUnit;
