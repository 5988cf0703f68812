//! Content store adapter.
//!
//! Raw posts and produced reports live in a key-addressed blob store. Keys
//! are `/`-separated paths such as `raw/ubc_2024_06_01.jsonl` or
//! `reports/2024-06-01/analysis-120000.json`.

pub mod fs;
#[cfg(test)]
pub mod memory;

pub use fs::FsStore;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Time range used to narrow a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Read/write access to the blob store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Store `bytes` under `key`. Writes are atomic: readers never observe a
    /// partially written object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Whether an object is stored under `key`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// List keys starting with `prefix` that may hold data for `range`,
    /// in lexicographic order.
    ///
    /// Objects last written before `range.start` cannot contain posts
    /// authored inside the range and are left out.
    async fn list(&self, prefix: &str, range: TimeRange) -> Result<Vec<String>, StoreError>;
}

/// Reject keys that could escape the store root.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg == ".." || seg == ".");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
