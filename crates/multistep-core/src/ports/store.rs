//! SharedStore port - 全ワーカーが共有する key-value store
//!
//! Every method is a single atomic round trip. The coordinator never needs
//! more than that: counters use `incr`, the finalizer lease uses
//! `set_if_absent`, the finalization chain uses `list_push`/`list_pop`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("wrong type for key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store backend: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Atomic increment-and-fetch. Missing keys start at 0.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Integer read, 0 when missing.
    async fn get_int(&self, key: &str) -> Result<i64, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Returns whether the value was newly set.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn set_is_member(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Push to the tail, returning the new length.
    async fn list_push(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// Pop from the head.
    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError>;
}

/// Scopes keys under `<prefix>:`.
#[derive(Clone)]
pub struct Namespace {
    store: Arc<dyn SharedStore>,
    prefix: String,
}

impl Namespace {
    pub fn new(store: Arc<dyn SharedStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }

    /// A namespace nested inside this one.
    pub fn child(&self, name: &str) -> Namespace {
        Namespace::new(Arc::clone(&self.store), self.key(name))
    }

    pub async fn incr(&self, name: &str) -> Result<i64, StoreError> {
        self.store.incr(&self.key(name)).await
    }

    pub async fn get_int(&self, name: &str) -> Result<i64, StoreError> {
        self.store.get_int(&self.key(name)).await
    }

    pub async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.store.get(&self.key(name)).await
    }

    pub async fn set(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.store.set(&self.key(name), value).await
    }

    pub async fn set_if_absent(&self, name: &str, value: &str) -> Result<bool, StoreError> {
        self.store.set_if_absent(&self.key(name), value).await
    }

    pub async fn set_add(&self, name: &str, member: &str) -> Result<bool, StoreError> {
        self.store.set_add(&self.key(name), member).await
    }

    pub async fn set_remove(&self, name: &str, member: &str) -> Result<bool, StoreError> {
        self.store.set_remove(&self.key(name), member).await
    }

    pub async fn set_is_member(&self, name: &str, member: &str) -> Result<bool, StoreError> {
        self.store.set_is_member(&self.key(name), member).await
    }

    pub async fn set_members(&self, name: &str) -> Result<Vec<String>, StoreError> {
        self.store.set_members(&self.key(name)).await
    }

    pub async fn list_push(&self, name: &str, value: &str) -> Result<usize, StoreError> {
        self.store.list_push(&self.key(name), value).await
    }

    pub async fn list_pop(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.store.list_pop(&self.key(name)).await
    }

    pub async fn list_range(&self, name: &str) -> Result<Vec<String>, StoreError> {
        self.store.list_range(&self.key(name)).await
    }

    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        self.store.exists(&self.key(name)).await
    }

    pub async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        self.store.delete(&self.key(name)).await
    }

    /// Remove every key in this namespace.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        self.store.delete_prefix(&format!("{}:", self.prefix)).await
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
