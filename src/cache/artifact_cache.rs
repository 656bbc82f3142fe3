//! Artifact cache (spec 4.8): content-addressed on-disk store with an LRU
//! eviction policy and a JSON manifest. Grounded on the donor's
//! `GlobalStore`/`PackageEntry` (hash-sharded store paths, reference
//! counting) but generalized to the manifest schema from spec 6 and fixed to
//! use real wall-clock timestamps — the donor's `current_timestamp()`
//! returned a literal constant and its `age_seconds`/`is_expired` were
//! always-false stubs, which would silently defeat the size-bound invariant
//! here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::coordinate::Coordinate;
use crate::error::{DepotError, Result};
use crate::options::CacheOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub file_path: PathBuf,
    pub size: u64,
    pub checksum: String,
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
    pub ecosystem: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    version: String,
    created_at: DateTime<Utc>,
    entries: HashMap<String, CacheEntry>,
    total_size: u64,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            created_at: Utc::now(),
            entries: HashMap::new(),
            total_size: 0,
        }
    }
}

pub struct ArtifactCache {
    options: CacheOptions,
    manifest: RwLock<Manifest>,
}

impl ArtifactCache {
    pub async fn open(options: CacheOptions) -> Result<Self> {
        tokio::fs::create_dir_all(&options.cache_root).await?;
        let manifest_path = options.cache_root.join("manifest.json");
        let manifest = match tokio::fs::read(&manifest_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Manifest::default(),
        };
        Ok(Self {
            options,
            manifest: RwLock::new(manifest),
        })
    }

    /// Final on-disk path for a coordinate's artifact, per spec 4.8's layout.
    #[must_use]
    pub fn path_for(&self, coord: &Coordinate, filename: &str) -> PathBuf {
        self.options
            .cache_root
            .join(coord.ecosystem.to_string())
            .join(coord.sanitized_name())
            .join(&coord.version)
            .join(filename)
    }

    pub async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let mut manifest = self.manifest.write().await;
        if let Some(entry) = manifest.entries.get_mut(key) {
            entry.last_accessed_at = Utc::now();
            entry.access_count += 1;
            return Some(entry.clone());
        }
        None
    }

    /// Registers a newly-downloaded artifact already present at `file_path`,
    /// evicting least-recently-used entries down to the hysteresis target if
    /// the insertion pushes the cache over its size budget.
    pub async fn insert(
        &self,
        key: String,
        file_path: PathBuf,
        size: u64,
        checksum: String,
        algorithm: String,
        ecosystem: String,
    ) -> Result<()> {
        let now = Utc::now();
        let entry = CacheEntry {
            key: key.clone(),
            file_path,
            size,
            checksum,
            algorithm,
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
            ecosystem,
        };

        let mut manifest = self.manifest.write().await;
        if let Some(old) = manifest.entries.insert(key, entry) {
            manifest.total_size = manifest.total_size.saturating_sub(old.size);
        }
        manifest.total_size += size;

        if manifest.total_size > self.options.max_size_bytes {
            self.evict_locked(&mut manifest).await;
        }
        self.write_manifest_locked(&manifest).await
    }

    async fn evict_locked(&self, manifest: &mut Manifest) {
        let target = (self.options.max_size_bytes as f64 * self.options.eviction_target_ratio) as u64;
        let mut ordered: Vec<String> = manifest.entries.keys().cloned().collect();
        ordered.sort_by_key(|k| manifest.entries[k].last_accessed_at);

        for key in ordered {
            if manifest.total_size <= target {
                break;
            }
            if let Some(entry) = manifest.entries.remove(&key) {
                let _ = tokio::fs::remove_file(&entry.file_path).await;
                manifest.total_size = manifest.total_size.saturating_sub(entry.size);
            }
        }
    }

    async fn write_manifest_locked(&self, manifest: &Manifest) -> Result<()> {
        let path = self.options.cache_root.join("manifest.json");
        let tmp = self.options.cache_root.join("manifest.json.tmp");
        let bytes = serde_json::to_vec_pretty(manifest)?;
        tokio::fs::write(&tmp, bytes).await.map_err(|e| DepotError::Io { path: tmp.clone(), source: e })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| DepotError::Io { path, source: e })?;
        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        let manifest = self.manifest.read().await;
        let mut per_ecosystem: HashMap<String, u64> = HashMap::new();
        for entry in manifest.entries.values() {
            *per_ecosystem.entry(entry.ecosystem.clone()).or_default() += entry.size;
        }
        CacheStats {
            total_size: manifest.total_size,
            entry_count: manifest.entries.len(),
            per_ecosystem,
        }
    }

    pub async fn clear(&self) -> Result<()> {
        let mut manifest = self.manifest.write().await;
        for entry in manifest.entries.values() {
            let _ = tokio::fs::remove_file(&entry.file_path).await;
        }
        manifest.entries.clear();
        manifest.total_size = 0;
        self.write_manifest_locked(&manifest).await
    }

    #[must_use]
    pub fn cache_root(&self) -> &Path {
        &self.options.cache_root
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_size: u64,
    pub entry_count: usize,
    pub per_ecosystem: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Ecosystem;

    async fn cache_in(dir: &Path) -> ArtifactCache {
        ArtifactCache::open(CacheOptions {
            cache_root: dir.to_path_buf(),
            max_size_bytes: 1000,
            eviction_target_ratio: 0.5,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path()).await;
        let coord = Coordinate::new(Ecosystem::Pip, "flask", "2.0.0");
        let path = cache.path_for(&coord, "flask-2.0.0-py3-none-any.whl");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"data").await.unwrap();

        cache
            .insert(coord.canonical_key(), path.clone(), 4, "abc".into(), "sha256".into(), "pip".into())
            .await
            .unwrap();

        let looked_up = cache.lookup(&coord.canonical_key()).await.unwrap();
        assert_eq!(looked_up.size, 4);
        assert_eq!(cache.stats().await.total_size, 4);
    }

    #[tokio::test]
    async fn eviction_keeps_total_size_under_max() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path()).await;
        for i in 0..5 {
            let coord = Coordinate::new(Ecosystem::Npm, format!("pkg{i}"), "1.0.0");
            let path = cache.path_for(&coord, "tarball.tgz");
            tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
            tokio::fs::write(&path, vec![0u8; 300]).await.unwrap();
            cache
                .insert(coord.canonical_key(), path, 300, "x".into(), "sha256".into(), "npm".into())
                .await
                .unwrap();
        }
        let stats = cache.stats().await;
        assert!(stats.total_size <= 1000);
    }
}
