//! Cache backend implementations.

use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use uuid::Uuid;

const ENTRY_EXTENSION: &str = "txt";
const TEMP_EXTENSION: &str = "tmp";

/// A stored payload. Callers only ever receive copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: String,
    pub stored_at: SystemTime,
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;
    async fn set(&self, key: &CacheKey, payload: &str) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    /// Remove every entry; returns how many were removed.
    async fn clear(&self) -> Result<usize>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// One file per key under a directory, content = raw payload bytes.
///
/// The directory is created on first write. Writes land in a uniquely named
/// temp file first and are renamed into place, so a reader sees either the old
/// or the new payload; concurrent writers of one key resolve last-rename-wins.
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> Result<PathBuf> {
        if !key.is_filesystem_safe() {
            return Err(Error::validation_with_context(
                "cache key is not filesystem-safe",
                ErrorContext::new()
                    .with_details(key.to_string())
                    .with_source("disk_cache"),
            ));
        }
        Ok(self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION)))
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
                && entry.file_type().await?.is_file()
            {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl CacheBackend for DiskCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let payload = String::from_utf8(bytes).map_err(|e| {
            Error::validation_with_context(
                format!("cached payload is not valid UTF-8: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("disk_cache"),
            )
        })?;
        let stored_at = tokio::fs::metadata(&path)
            .await
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        Ok(Some(CacheEntry {
            key: key.clone(),
            payload,
            stored_at,
        }))
    }

    async fn set(&self, key: &CacheKey, payload: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let temp = self.dir.join(format!(
            ".{}.{}.{}",
            key,
            Uuid::new_v4().simple(),
            TEMP_EXTENSION
        ));
        tokio::fs::write(&temp, payload.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let path = self.entry_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_files().await? {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                // Raced with another clear.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entry_files().await?.len())
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}

/// Bounded in-process LRU cache; nothing survives a restart.
pub struct MemoryCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<CacheKey, CacheEntry>>> {
        self.entries.lock().map_err(|_| {
            Error::validation_with_context(
                "memory cache lock poisoned",
                ErrorContext::new().with_source("memory_cache"),
            )
        })
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &CacheKey, payload: &str) -> Result<()> {
        let entry = CacheEntry {
            key: key.clone(),
            payload: payload.to_string(),
            stored_at: SystemTime::now(),
        };
        self.lock()?.put(key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.pop(key).is_some())
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.lock()?;
        let n = entries.len();
        entries.clear();
        Ok(n)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &str) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<usize> {
        Ok(0)
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
