//! Resource cache with pluggable storage.
//!
//! The cache maps a media reference string to the raw bytes it resolved to.
//! It lives for one run and is owned by the resolver; the store behind it
//! decides whether anything outlives the process.

use crate::types::MediaReference;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Backing storage for [`ResourceCache`].
pub trait CacheStore {
    /// Bytes stored under `key`, if any.
    fn get(&mut self, key: &str) -> Option<Arc<[u8]>>;

    /// Store bytes under `key`.
    fn put(&mut self, key: &str, bytes: Arc<[u8]>) -> io::Result<()>;

    /// Number of entries currently held in memory.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unbounded in-memory store, discarded at exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Arc<[u8]>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&mut self, key: &str) -> Option<Arc<[u8]>> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, bytes: Arc<[u8]>) -> io::Result<()> {
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// In-memory store that also writes downloaded media into a directory.
///
/// Only remote references are written to disk; local files already live on
/// disk. Files are named by the SHA-256 of the reference so a later run can
/// find them again.
#[derive(Debug)]
pub struct DirStore {
    dir: PathBuf,
    memory: MemoryStore,
}

impl DirStore {
    /// Create the store, creating `dir` if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            memory: MemoryStore::new(),
        })
    }

    /// File that holds the bytes for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.bin", hex::encode(&digest[..16])))
    }
}

impl CacheStore for DirStore {
    fn get(&mut self, key: &str) -> Option<Arc<[u8]>> {
        if let Some(bytes) = self.memory.get(key) {
            return Some(bytes);
        }

        if !matches!(MediaReference::classify(key), MediaReference::Remote(_)) {
            return None;
        }

        let path = self.entry_path(key);
        match std::fs::read(&path) {
            Ok(data) => {
                log::debug!("Loaded {} from {}", key, path.display());
                let bytes: Arc<[u8]> = data.into();
                self.memory.entries.insert(key.to_string(), bytes.clone());
                Some(bytes)
            }
            Err(_) => None,
        }
    }

    fn put(&mut self, key: &str, bytes: Arc<[u8]>) -> io::Result<()> {
        if matches!(MediaReference::classify(key), MediaReference::Remote(_)) {
            std::fs::write(self.entry_path(key), &bytes)?;
        }
        self.memory.put(key, bytes)
    }

    fn len(&self) -> usize {
        self.memory.len()
    }
}

/// Process-lifetime cache of resolved media, keyed by reference string.
pub struct ResourceCache {
    store: Box<dyn CacheStore>,
    hits: usize,
    misses: usize,
}

impl ResourceCache {
    /// Cache backed by the given store.
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self {
            store,
            hits: 0,
            misses: 0,
        }
    }

    /// Cache that keeps everything in memory.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Look up `key`, counting the hit or miss.
    pub fn get(&mut self, key: &str) -> Option<Arc<[u8]>> {
        let found = self.store.get(key);
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Store bytes under `key`. A store failure only costs a future re-fetch.
    pub fn insert(&mut self, key: &str, bytes: Arc<[u8]>) {
        if let Err(e) = self.store.put(key, bytes) {
            log::warn!("Could not persist cached resource {}: {}", key, e);
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &self.store.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}
