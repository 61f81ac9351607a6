//! CoordinatorBuilder - Coordinator の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `expect_jobs()` で期待される job type を登録
//! - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば BuildError を返す

use std::sync::Arc;

use super::config::CoordinatorConfig;
use super::coordinator::Coordinator;
use crate::impls::{InMemoryStore, InMemoryWorkQueue};
use crate::ports::{Clock, SharedStore, SystemClock, WorkQueue};
use crate::typed::{HookSet, Job, JobRegistry, RegistryError};

/// # 使用例
/// ```ignore
/// let coordinator = CoordinatorBuilder::new()
///     .config(CoordinatorConfig::default())
///     .store(redis_store)
///     .queue(redis_queue)
///     .register(ResizeImage)?
///     .expect_jobs(&["images.resize"])
///     .build()?;
/// ```
///
/// Store and queue default to the in-memory implementations.
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    registry: JobRegistry,
    expected_jobs: Option<Vec<String>>,
    store: Option<Arc<dyn SharedStore>>,
    queue: Option<Arc<dyn WorkQueue>>,
    clock: Option<Arc<dyn Clock>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing job types: {0:?}. These jobs were expected but not registered.")]
    MissingJobTypes(Vec<String>),
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            config: CoordinatorConfig::default(),
            registry: JobRegistry::new(),
            expected_jobs: None,
            store: None,
            queue: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn WorkQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn register<J: Job>(mut self, job: J) -> Result<Self, RegistryError> {
        self.registry.register(job)?;
        Ok(self)
    }

    pub fn register_with_hooks<J: Job>(
        mut self,
        job: J,
        hooks: HookSet,
    ) -> Result<Self, RegistryError> {
        self.registry.register_with_hooks(job, hooks)?;
        Ok(self)
    }

    /// Job types that must be registered by the time `build()` runs.
    pub fn expect_jobs(mut self, job_types: &[&str]) -> Self {
        self.expected_jobs = Some(job_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Coordinator, BuildError> {
        if let Some(expected) = &self.expected_jobs {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !self.registry.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingJobTypes(missing));
            }
        }

        let store: Arc<dyn SharedStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStore::new()),
        };
        let queue: Arc<dyn WorkQueue> = match self.queue {
            Some(queue) => queue,
            None => Arc::new(InMemoryWorkQueue::new()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        Ok(Coordinator::new(
            self.config,
            store,
            queue,
            Arc::new(self.registry),
            clock,
        ))
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
