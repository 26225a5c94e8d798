//! Content-addressed disk cache for item bytes.
//!
//! Files live directly under the cache root and are named by the content
//! hash the server reported. Entries are never evicted. Every failure is
//! logged and swallowed: the cache can only save a round trip, never cause
//! one to fail.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cached bytes for `hash`, if present and readable.
    pub fn load(&self, hash: &str) -> Option<Bytes> {
        let path = self.entry(hash)?;
        match fs::read(&path) {
            Ok(data) => {
                tracing::debug!(hash, bytes = data.len(), "disk cache hit");
                Some(Bytes::from(data))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read cache entry");
                None
            }
        }
    }

    /// Store `data` under `hash`. An empty payload removes the entry.
    pub fn store(&self, hash: &str, data: &[u8]) {
        let Some(path) = self.entry(hash) else {
            return;
        };

        if data.is_empty() {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(hash, "removed cache entry"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to remove cache entry")
                }
            }
            return;
        }

        if let Err(err) = fs::create_dir_all(&self.root).and_then(|()| fs::write(&path, data)) {
            tracing::warn!(path = %path.display(), error = %err, "failed to write cache entry");
        }
    }

    fn entry(&self, hash: &str) -> Option<PathBuf> {
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_alphanumeric()) {
            tracing::debug!(hash, "not a usable cache key");
            return None;
        }
        Some(self.root.join(hash))
    }
}
