//! Shared metadata cache (spec 4.5): in-memory LRU plus on-disk JSON, keyed
//! by URL hash, with TTL staleness and single-flight deduplication of
//! concurrent misses. Grounded on the donor's `DownloadCache` (in-memory
//! map + access-count/age LRU eviction), generalized here to a two-tier
//! cache with a disk-backed second tier and a real clock instead of the
//! donor's hardcoded timestamp.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, Semaphore};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    body: Vec<u8>,
    fetched_at: u64,
    access_count: u64,
}

impl Entry {
    fn is_stale(&self, ttl: Duration, now: u64) -> bool {
        now.saturating_sub(self.fetched_at) > ttl.as_secs()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Two-tier metadata cache: hot in-memory map, cold on-disk JSON files under
/// `disk_root`, both keyed by `(ecosystem, url)` hashed into a filename.
pub struct MetadataCache {
    memory: Mutex<HashMap<String, Entry>>,
    disk_root: Option<PathBuf>,
    max_memory_entries: usize,
    /// Single-flight: one semaphore per in-flight key collapses concurrent
    /// misses into a single fetch.
    inflight: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl MetadataCache {
    #[must_use]
    pub fn new(disk_root: Option<PathBuf>, max_memory_entries: usize) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            disk_root,
            max_memory_entries,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn key(ecosystem: &str, url: &str) -> String {
        format!("{ecosystem}:{}", url_hash(url))
    }

    async fn read_disk(&self, key: &str) -> Option<Entry> {
        let root = self.disk_root.as_ref()?;
        let path = root.join(format!("{key}.json"));
        let bytes = tokio::fs::read(&path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn write_disk(&self, key: &str, entry: &Entry) {
        let Some(root) = &self.disk_root else { return };
        if tokio::fs::create_dir_all(root).await.is_err() {
            return;
        }
        let path = root.join(format!("{key}.json"));
        let tmp = root.join(format!("{key}.json.tmp"));
        if let Ok(bytes) = serde_json::to_vec(entry) {
            if tokio::fs::write(&tmp, bytes).await.is_ok() {
                let _ = tokio::fs::rename(&tmp, &path).await;
            }
        }
    }

    /// Fetches `url`'s body through the cache: memory, then disk (if still
    /// within `ttl`), then `fetch` (network), deduplicating concurrent
    /// misses for the same key via a per-key semaphore.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        ecosystem: &str,
        url: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<u8>>>,
    {
        let key = Self::key(ecosystem, url);
        let now = now_secs();

        {
            let mut mem = self.memory.lock().await;
            if let Some(entry) = mem.get_mut(&key) {
                if !entry.is_stale(ttl, now) {
                    entry.access_count += 1;
                    return Ok(entry.body.clone());
                }
            }
        }

        if let Some(entry) = self.read_disk(&key).await {
            if !entry.is_stale(ttl, now) {
                let mut mem = self.memory.lock().await;
                self.insert_memory_locked(&mut mem, key.clone(), entry.clone());
                return Ok(entry.body);
            }
        }

        // Single-flight: only the first caller for this key actually fetches.
        let permit_holder = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        let _permit = permit_holder.acquire().await;

        // Re-check memory: a concurrent caller may have already populated it
        // while we waited for the permit.
        {
            let mem = self.memory.lock().await;
            if let Some(entry) = mem.get(&key) {
                if !entry.is_stale(ttl, now_secs()) {
                    return Ok(entry.body.clone());
                }
            }
        }

        let body = fetch().await?;
        let entry = Entry {
            body: body.clone(),
            fetched_at: now_secs(),
            access_count: 1,
        };
        {
            let mut mem = self.memory.lock().await;
            self.insert_memory_locked(&mut mem, key.clone(), entry.clone());
        }
        self.write_disk(&key, &entry).await;
        self.inflight.lock().await.remove(&key);
        Ok(body)
    }

    fn insert_memory_locked(&self, mem: &mut HashMap<String, Entry>, key: String, entry: Entry) {
        if mem.len() >= self.max_memory_entries {
            if let Some(evict_key) = mem
                .iter()
                .min_by_key(|(_, e)| (e.access_count, e.fetched_at))
                .map(|(k, _)| k.clone())
            {
                mem.remove(&evict_key);
            }
        }
        mem.insert(key, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn repeated_lookups_hit_memory_without_refetching() {
        let cache = MetadataCache::new(None, 16);
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = calls.clone();
            let body = cache
                .get_or_fetch("pip", "https://pypi.org/pypi/flask/json", Duration::from_secs(60), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(b"{}".to_vec())
                })
                .await
                .unwrap();
            assert_eq!(body, b"{}");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entries_trigger_refetch() {
        let cache = MetadataCache::new(None, 16);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        cache
            .get_or_fetch("npm", "https://registry.npmjs.org/left-pad", Duration::from_secs(0), move || async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(b"v1".to_vec())
            })
            .await
            .unwrap();
        let calls3 = calls.clone();
        let body = cache
            .get_or_fetch("npm", "https://registry.npmjs.org/left-pad", Duration::from_secs(0), move || async move {
                calls3.fetch_add(1, Ordering::SeqCst);
                Ok(b"v2".to_vec())
            })
            .await
            .unwrap();
        assert_eq!(body, b"v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
