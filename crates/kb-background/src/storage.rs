//! External key-value store.
//!
//! The browser's sync storage is eventually consistent and last-writer-wins;
//! this side never merges, it only reads and overwrites whole values.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;

#[async_trait(?Send)]
pub trait SyncStorage {
    /// Value stored under `key`, or `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Process-local store, for hosts without persistence and for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RefCell<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: Value) -> Self {
        let storage = Self::default();
        storage.values.borrow_mut().insert(key.to_string(), value);
        storage
    }

    /// Current raw value, bypassing the async interface.
    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }
}

#[async_trait(?Send)]
impl SyncStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}
