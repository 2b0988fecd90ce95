use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, trace, warn};

use crate::error::{Result, TupleError};
use crate::identity::TypeIdentity;
use crate::source::{DefinitionDocument, DefinitionSource};

/// Cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Cache directory path
    pub directory: PathBuf,
    /// Time-to-live for cached definitions in hours
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("xml-tuples"),
            ttl_hours: 24,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }
}

/// Metadata for cached definition entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub key: String,
    pub identity: TypeIdentity,
    pub origin: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl CacheMetadata {
    pub fn new(key: String, identity: TypeIdentity, origin: String, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at =
            now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24));

        Self {
            key,
            identity,
            origin,
            created_at: now,
            expires_at,
            size_bytes: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size_bytes = size;
        self
    }
}

/// A cached definition with its data and metadata
#[derive(Debug, Clone)]
pub struct CachedDefinition {
    pub data: Arc<Vec<u8>>,
    pub metadata: CacheMetadata,
}

/// Disk cache using cacache for persistent, corruption-resistant storage
pub struct DiskCache {
    cache_dir: PathBuf,
}

impl DiskCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Cache key for a type identity
    pub fn generate_key(identity: &TypeIdentity) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        identity.as_str().hash(&mut hasher);
        format!("definition_{:x}", hasher.finish())
    }

    /// Unexpired entry for `key`; expired entries are removed on the way.
    pub async fn get(&self, key: &str) -> Result<Option<CachedDefinition>> {
        let metadata = match self.get_metadata(key).await? {
            Some(metadata) if !metadata.is_expired() => metadata,
            _ => {
                let _ = self.remove(key).await;
                return Ok(None);
            }
        };

        match cacache::read(&self.cache_dir, key).await {
            Ok(data) => Ok(Some(CachedDefinition {
                data: Arc::new(data),
                metadata,
            })),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(TupleError::Cache(format!(
                "Failed to read from disk cache: {}",
                e
            ))),
        }
    }

    pub async fn set(&self, key: &str, data: &[u8], metadata: CacheMetadata) -> Result<()> {
        cacache::write(&self.cache_dir, key, data)
            .await
            .map_err(|e| TupleError::Cache(format!("Failed to write to disk cache: {}", e)))?;

        self.set_metadata(key, &metadata).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let _ = cacache::remove(&self.cache_dir, key).await;
        let _ = fs::remove_file(self.metadata_path(key)).await;
        Ok(())
    }

    /// Check if entry exists and is not expired
    pub async fn contains(&self, key: &str) -> Result<bool> {
        match self.get_metadata(key).await? {
            Some(metadata) => Ok(!metadata.is_expired()),
            None => Ok(false),
        }
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();

        // A missing index just means nothing was cached yet
        if let Ok(entries) = cacache::index::ls(&self.cache_dir).collect::<std::result::Result<Vec<_>, _>>() {
            for entry in entries {
                stats.entry_count += 1;
                stats.total_size += entry.size as u64;
            }
        }

        Ok(stats)
    }

    pub async fn cleanup_expired(&self) -> Result<CleanupStats> {
        let mut cleanup_stats = CleanupStats::default();

        match cacache::index::ls(&self.cache_dir).collect::<std::result::Result<Vec<_>, _>>() {
            Ok(entries) => {
                for entry in entries {
                    if let Ok(Some(metadata)) = self.get_metadata(&entry.key).await
                        && metadata.is_expired()
                    {
                        cleanup_stats.expired_entries += 1;
                        cleanup_stats.freed_bytes += entry.size as u64;

                        if let Err(e) = self.remove(&entry.key).await {
                            cleanup_stats
                                .errors
                                .push(format!("Failed to remove {}: {}", entry.key, e));
                        } else {
                            cleanup_stats.removed_entries += 1;
                        }
                    }
                }
            }
            Err(e) => {
                cleanup_stats
                    .errors
                    .push(format!("Failed to read cache index: {}", e));
            }
        }

        Ok(cleanup_stats)
    }

    pub async fn clear(&self) -> Result<()> {
        cacache::clear(&self.cache_dir)
            .await
            .map_err(|e| TupleError::Cache(format!("Failed to clear disk cache: {}", e)))?;

        let metadata_dir = self.cache_dir.join("metadata");
        match fs::remove_dir_all(&metadata_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TupleError::Cache(format!(
                "Failed to clear metadata: {}",
                e
            ))),
        }
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<CacheMetadata>> {
        let metadata_path = self.metadata_path(key);

        match fs::read_to_string(&metadata_path).await {
            Ok(content) => {
                let metadata: CacheMetadata = serde_json::from_str(&content).map_err(|e| {
                    TupleError::Cache(format!("Failed to parse metadata: {}", e))
                })?;
                Ok(Some(metadata))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TupleError::Cache(format!(
                "Failed to read metadata: {}",
                e
            ))),
        }
    }

    async fn set_metadata(&self, key: &str, metadata: &CacheMetadata) -> Result<()> {
        let metadata_path = self.metadata_path(key);

        if let Some(parent) = metadata_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                TupleError::Cache(format!("Failed to create metadata directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(metadata)
            .map_err(|e| TupleError::Cache(format!("Failed to serialize metadata: {}", e)))?;

        fs::write(&metadata_path, content)
            .await
            .map_err(|e| TupleError::Cache(format!("Failed to write metadata: {}", e)))?;

        Ok(())
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join("metadata")
            .join(format!("{}.json", key))
    }
}

/// Wraps another source with a persistent on-disk copy of every loaded definition
pub struct CachingDefinitionSource {
    inner: Arc<dyn DefinitionSource>,
    disk: DiskCache,
    ttl: Duration,
}

impl CachingDefinitionSource {
    pub fn new(inner: Arc<dyn DefinitionSource>, config: &CacheConfig) -> Self {
        Self {
            inner,
            disk: DiskCache::new(config.directory.clone()),
            ttl: config.ttl(),
        }
    }

    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }
}

#[async_trait]
impl DefinitionSource for CachingDefinitionSource {
    async fn load(&self, identity: &TypeIdentity) -> Result<DefinitionDocument> {
        let key = DiskCache::generate_key(identity);

        match self.disk.get(&key).await {
            Ok(Some(cached)) if cached.metadata.identity != *identity => {
                debug!(
                    "Cache key {} holds {}, not {}; reloading",
                    key, cached.metadata.identity, identity
                );
            }
            Ok(Some(cached)) => match String::from_utf8(cached.data.as_ref().clone()) {
                Ok(text) => {
                    trace!("Disk cache hit for {}", identity);
                    return Ok(DefinitionDocument {
                        identity: identity.clone(),
                        text,
                        origin: cached.metadata.origin,
                    });
                }
                Err(e) => warn!("Ignoring undecodable cache entry for {}: {}", identity, e),
            },
            Ok(None) => {}
            Err(e) => warn!("Disk cache lookup failed for {}: {}", identity, e),
        }

        let document = self.inner.load(identity).await?;

        let metadata = CacheMetadata::new(
            key.clone(),
            identity.clone(),
            document.origin.clone(),
            self.ttl,
        )
        .with_size(document.text.len() as u64);
        match self.disk.set(&key, document.text.as_bytes(), metadata).await {
            Ok(()) => debug!("Cached definition of {} from {}", identity, document.origin),
            Err(e) => warn!("Failed to cache definition of {}: {}", identity, e),
        }

        Ok(document)
    }
}

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub entry_count: u64,
    pub total_size: u64,
}

#[derive(Debug, Default, Clone)]
pub struct CleanupStats {
    pub expired_entries: u64,
    pub removed_entries: u64,
    pub freed_bytes: u64,
    pub errors: Vec<String>,
}
