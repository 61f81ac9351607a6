//! Ports - 外部システムへの抽象化レイヤー
//!
//! The coordinator only talks to the outside world through these traits:
//! - `SharedStore`: key-value store shared by every worker (Redis-like)
//! - `WorkQueue`: named queues with at-least-once delivery and a failure list
//! - `Clock`: wall-clock time, swappable in tests

pub mod clock;
pub mod queue;
pub mod store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::queue::{Delivery, FailedUnit, QueueError, WorkQueue};
pub use self::store::{Namespace, SharedStore, StoreError};
