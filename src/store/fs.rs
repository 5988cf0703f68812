//! Filesystem-backed content store.
//!
//! Keys map to files below a root directory. Listing walks the tree with
//! `walkdir`; writes go through a temporary file in the target directory and
//! are renamed into place.

use super::{validate_key, ContentStore, TimeRange};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

/// Content store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn io_err(key: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(key.to_string())
        } else {
            StoreError::Io {
                key: key.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl ContentStore for FsStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(io_err(key))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let owned_key = key.to_string();

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StoreError::Io {
                key: owned_key.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?
            .map_err(io_err(key))?;

        debug!("Stored {} in {}", key, self.root.display());
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path).await.map_err(io_err(key))
    }

    async fn list(&self, prefix: &str, range: TimeRange) -> Result<Vec<String>, StoreError> {
        if !prefix.is_empty() {
            validate_key(prefix.trim_end_matches('/'))?;
        }
        let root = self.root.clone();
        let owned_prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || list_keys(&root, &owned_prefix, range))
            .await
            .map_err(|e| StoreError::Io {
                key: prefix.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?
            .map_err(io_err(prefix))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn list_keys(root: &Path, prefix: &str, range: TimeRange) -> std::io::Result<Vec<String>> {
    // Only walk the directory the prefix points into.
    let walk_root = match prefix.rfind('/') {
        Some(idx) => root.join(&prefix[..idx]),
        None => root.to_path_buf(),
    };
    if !walk_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut keys = Vec::new();
    for entry in WalkDir::new(&walk_root).follow_links(false) {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk loop"))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        // In-flight temp files from concurrent writers
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !key.starts_with(prefix) {
            continue;
        }

        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);
        if matches!(modified, Some(ts) if ts < range.start) {
            continue;
        }

        keys.push(key);
    }

    keys.sort();
    Ok(keys)
}
