//! In-memory content store for tests.

use super::{validate_key, ContentStore, TimeRange};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
    fail_list: AtomicBool,
    fail_put: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object with an explicit last-modified time.
    pub fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>, modified: DateTime<Utc>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.into(), modified));
    }

    pub fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub fn fail_put(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

fn unavailable(key: &str) -> StoreError {
    StoreError::Io {
        key: key.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "store unavailable"),
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        validate_key(key)?;
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(unavailable(key));
        }
        self.insert(key, bytes, Utc::now());
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn list(&self, prefix: &str, range: TimeRange) -> Result<Vec<String>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(unavailable(prefix));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, (_, modified))| key.starts_with(prefix) && *modified >= range.start)
            .map(|(key, _)| key.clone())
            .collect())
    }
}
