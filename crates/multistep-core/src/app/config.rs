//! Coordinator configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DEFAULT_SLUG;

pub const DEFAULT_NAMESPACE: &str = "multisteptask";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown execution mode '{0}' (expected sync or async)")]
    UnknownMode(String),

    #[error("invalid coordinator config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How jobs get run.
///
/// - `Async`: jobs are queued and run by workers (production).
/// - `Sync`: jobs run in the calling task as soon as they are added, and
///   finalization runs inline. Meant for tests and local development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sync,
    #[default]
    Async,
}

impl FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Ok(ExecutionMode::Sync),
            "async" | "asynchronous" => Ok(ExecutionMode::Async),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sync => f.write_str("sync"),
            ExecutionMode::Async => f.write_str("async"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub mode: ExecutionMode,

    /// Prefix for every key the coordinator writes.
    pub namespace: String,

    /// Slug used for tasks created without one.
    pub default_slug: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Async,
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_slug: DEFAULT_SLUG.to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn synchronous() -> Self {
        Self::default().with_mode(ExecutionMode::Sync)
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn is_synchronous(&self) -> bool {
        self.mode == ExecutionMode::Sync
    }

    /// Missing fields fall back to their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}
