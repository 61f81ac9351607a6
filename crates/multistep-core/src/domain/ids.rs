//! Task identifiers.
//!
//! A task id is `<slug>~<nonce>`. The slug is descriptive and may repeat
//! across tasks; the nonce is 5 random alphanumeric characters.
//!
//! Collisions between nonces are not detected. Creating a task whose id
//! happens to equal an active one wipes the active task's state.
//!
//! Store keys are `:`-separated and a task's keys all sit under
//! `<namespace>:<task id>:`, so a `:` in a slug is replaced with `-`. Without
//! that, wiping task `a~XYZ12` would also wipe task `a~XYZ12:b~QRS34`.

use std::fmt;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Slug used when `create` is called without one (or with an empty one).
pub const DEFAULT_SLUG: &str = "multi-step-task";

pub const NONCE_LEN: usize = 5;

const SEPARATOR: char = '~';

const KEY_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Build a fresh id from an optional slug.
    pub fn generate(slug: Option<&str>, default_slug: &str) -> Self {
        let slug = match slug {
            Some(slug) if !slug.is_empty() => slug,
            _ => default_slug,
        };
        Self::with_nonce(slug, &nonce())
    }

    pub fn with_nonce(slug: &str, nonce: &str) -> Self {
        let slug = slug.replace(KEY_SEPARATOR, "-");
        Self(format!("{slug}{SEPARATOR}{nonce}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the last `~`.
    pub fn slug(&self) -> &str {
        self.0
            .rsplit_once(SEPARATOR)
            .map_or(self.0.as_str(), |(slug, _)| slug)
    }

    pub fn nonce(&self) -> Option<&str> {
        self.0.rsplit_once(SEPARATOR).map(|(_, nonce)| nonce)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 5 characters drawn from `[a-zA-Z0-9]`.
pub fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}
