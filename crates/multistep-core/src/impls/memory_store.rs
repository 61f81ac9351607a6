//! InMemoryStore - 開発用の SharedStore
//!
//! All keys live in one `HashMap` behind a `std::sync::Mutex`. Each trait
//! method takes the lock once and never awaits while holding it, so every
//! call is atomic with respect to every other call.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::ports::{SharedStore, StoreError};

#[derive(Debug, Clone)]
enum Entry {
    Int(i64),
    Str(String),
    Set(BTreeSet<String>),
    List(VecDeque<String>),
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Poisoned
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

fn parse_int(key: &str, raw: &str) -> Result<i64, StoreError> {
    raw.parse().map_err(|_| wrong_type(key, "integer"))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries.lock().map_err(poison_err)
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    /// All keys starting with `prefix`, sorted.
    pub fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let entries = self.lock()?;
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut entries = self.lock()?;
        let next = match entries.get(key) {
            None => 1,
            Some(Entry::Int(n)) => n + 1,
            Some(Entry::Str(raw)) => parse_int(key, raw)? + 1,
            Some(_) => return Err(wrong_type(key, "integer")),
        };
        entries.insert(key.to_string(), Entry::Int(next));
        Ok(next)
    }

    async fn get_int(&self, key: &str) -> Result<i64, StoreError> {
        match self.lock()?.get(key) {
            None => Ok(0),
            Some(Entry::Int(n)) => Ok(*n),
            Some(Entry::Str(raw)) => parse_int(key, raw),
            Some(_) => Err(wrong_type(key, "integer")),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.lock()?.get(key) {
            None => Ok(None),
            Some(Entry::Int(n)) => Ok(Some(n.to_string())),
            Some(Entry::Str(raw)) => Ok(Some(raw.clone())),
            Some(_) => Err(wrong_type(key, "string")),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?
            .insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.lock()?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(true)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.lock()?;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));
        match entry {
            Entry::Set(members) => Ok(members.insert(member.to_string())),
            _ => Err(wrong_type(key, "set")),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.lock()?;
        let removed = match entries.get_mut(key) {
            None => return Ok(false),
            Some(Entry::Set(members)) => members.remove(member),
            Some(_) => return Err(wrong_type(key, "set")),
        };
        if matches!(entries.get(key), Some(Entry::Set(members)) if members.is_empty()) {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn set_is_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        match self.lock()?.get(key) {
            None => Ok(false),
            Some(Entry::Set(members)) => Ok(members.contains(member)),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.lock()?.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut entries = self.lock()?;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        match entry {
            Entry::List(items) => {
                items.push_back(value.to_string());
                Ok(items.len())
            }
            _ => Err(wrong_type(key, "list")),
        }
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.lock()?;
        let (popped, now_empty) = match entries.get_mut(key) {
            None => return Ok(None),
            Some(Entry::List(items)) => {
                let popped = items.pop_front();
                (popped, items.is_empty())
            }
            Some(_) => return Err(wrong_type(key, "list")),
        };
        // an emptied list stops existing, as in Redis
        if now_empty {
            entries.remove(key);
        }
        Ok(popped)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.lock()?.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(items)) => Ok(items.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key, "list")),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}
