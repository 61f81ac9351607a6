//! Impls - ports の実装（開発用・テスト用）
//!
//! - **InMemoryStore**: process-local SharedStore
//! - **InMemoryWorkQueue**: process-local WorkQueue with a failure list
//!
//! Neither is durable or shared across processes. Production deployments
//! plug a Redis-backed store and queue into the same ports.

pub mod memory_queue;
pub mod memory_store;

pub use self::memory_queue::InMemoryWorkQueue;
pub use self::memory_store::InMemoryStore;
