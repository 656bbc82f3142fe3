//! Bounded-concurrency download queue (spec 4.6): FIFO dispatch with a
//! smaller-first priority override, retry with capped exponential backoff
//! plus jitter, and a pause/resume/cancel lifecycle. Concurrency and retry
//! shape are grounded on the donor's `ParallelDownloader`
//! (`Semaphore`-bounded workers via a `JoinSet`), generalized to a real
//! lifecycle instead of a one-shot `download_parallel` batch call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::{Mutex, Semaphore};

use crate::cache::artifact_cache::ArtifactCache;
use crate::download::downloader::{download_item, filename_for, DownloadOutcome};
use crate::error::{DepotError, ErrorKind};
use crate::events::{Event, EventSender};
use crate::model::download_item::{DownloadItem, DownloadStatus};
use crate::options::DownloadJobOptions;

/// A simple linear congruential generator seeded from the monotonic clock,
/// good enough for retry jitter without pulling in a dedicated `rand`
/// dependency the donor's stack doesn't otherwise need.
fn jitter_ms(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let seed = std::time::Instant::now().elapsed().subsec_nanos() as u64;
    seed.wrapping_mul(2_862_933_555_777_941_757).wrapping_add(3_037_000_493) % max
}

fn backoff_duration(attempt: u32, options: &DownloadJobOptions) -> Duration {
    let exp = options.retry_base_ms.saturating_mul(1u64 << attempt.min(20));
    let capped = exp.min(options.retry_cap_ms);
    Duration::from_millis(capped + jitter_ms(capped / 4 + 1))
}

pub struct DownloadQueue {
    client: Client,
    cache: Arc<ArtifactCache>,
    options: DownloadJobOptions,
    events: EventSender,
    items: Mutex<VecDeque<DownloadItem>>,
    semaphore: Arc<Semaphore>,
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    total_bytes_done: Arc<AtomicU64>,
}

impl DownloadQueue {
    #[must_use]
    pub fn new(client: Client, cache: Arc<ArtifactCache>, options: DownloadJobOptions, events: EventSender) -> Self {
        let concurrency = options.clamped_concurrency();
        Self {
            client,
            cache,
            options,
            events,
            items: Mutex::new(VecDeque::new()),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            paused: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            total_bytes_done: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Adds items in smaller-first priority order within this batch, then
    /// FIFO thereafter (spec 4.6).
    pub async fn enqueue(&self, mut new_items: Vec<DownloadItem>) {
        new_items.sort_by_key(|i| i.priority_hint);
        let mut items = self.items.lock().await;
        items.extend(new_items);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub async fn reset(&self) {
        self.items.lock().await.clear();
        self.cancelled.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.total_bytes_done.store(0, Ordering::SeqCst);
    }

    /// Drains the queue, dispatching up to `concurrency` workers at once.
    /// Runs until the queue is empty, `cancel()` is called, or every
    /// remaining item is terminal.
    pub async fn start(&self) -> Vec<DownloadItem> {
        let total_items = self.items.lock().await.len();
        let mut handles = Vec::new();

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                let mut items = self.items.lock().await;
                for item in items.iter_mut() {
                    item.status = DownloadStatus::Skipped;
                }
                break;
            }
            if self.paused.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }

            let next = self.items.lock().await.pop_front();
            let Some(mut item) = next else { break };

            let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore is never closed");
            let client = self.client.clone();
            let cache = self.cache.clone();
            let events = self.events.clone();
            let options = self.options.clone();
            let cancelled = self.cancelled.clone();
            let total_bytes_done = self.total_bytes_done.clone();

            item.status = DownloadStatus::Downloading;
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = run_with_retries(&client, &cache, &mut item, &options, &events, &cancelled).await;
                total_bytes_done.fetch_add(item.bytes_done, Ordering::SeqCst);
                events.send(Event::ItemComplete {
                    id: item.id.clone(),
                    name: item.coord.name.clone(),
                    version: item.coord.version.clone(),
                    status: status_label(item.status).to_string(),
                });
                let _ = result;
                item
            }));
        }

        let mut finished = Vec::new();
        for handle in handles {
            if let Ok(item) = handle.await {
                finished.push(item);
            }
        }
        let _ = total_items;
        finished
    }

    #[must_use]
    pub fn overall_progress(&self, completed_items: usize, total_items: usize, bytes_total_known: Option<(u64, u64)>) -> f64 {
        if let Some((done, total)) = bytes_total_known {
            if total > 0 {
                return (done as f64 / total as f64) * 100.0;
            }
        }
        if total_items == 0 {
            return 100.0;
        }
        (completed_items as f64 / total_items as f64) * 100.0
    }
}

fn status_label(status: DownloadStatus) -> &'static str {
    match status {
        DownloadStatus::Completed => "completed",
        DownloadStatus::Failed => "failed",
        DownloadStatus::Skipped => "skipped",
        DownloadStatus::Paused => "paused",
        DownloadStatus::Downloading => "downloading",
        DownloadStatus::Pending => "pending",
    }
}

async fn run_with_retries(
    client: &Client,
    cache: &ArtifactCache,
    item: &mut DownloadItem,
    options: &DownloadJobOptions,
    events: &EventSender,
    cancelled: &Arc<AtomicBool>,
) -> Result<(), DepotError> {
    loop {
        if cancelled.load(Ordering::SeqCst) {
            item.status = DownloadStatus::Skipped;
            return Ok(());
        }
        let filename = filename_for(&item.url, &item.coord);
        match download_item(client, cache, item, &filename, events).await {
            Ok(DownloadOutcome::Completed { bytes, .. }) => {
                item.bytes_done = bytes;
                item.status = DownloadStatus::Completed;
                return Ok(());
            }
            Ok(DownloadOutcome::CacheHit { .. }) => {
                item.status = DownloadStatus::Skipped;
                return Ok(());
            }
            Err(err) => {
                item.retry_count += 1;
                item.error = Some(err.kind());
                // Checksum mismatches get exactly one retry (spec 4.7); every
                // other retryable kind gets the full `max_retries` budget.
                let checksum_exhausted = err.kind() == ErrorKind::ChecksumMismatch && item.retry_count > 1;
                if !err.is_retryable() || item.retry_count > options.max_retries || checksum_exhausted {
                    item.status = DownloadStatus::Failed;
                    return Err(err);
                }
                tokio::time::sleep(backoff_duration(item.retry_count, options)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_respects_cap() {
        let options = DownloadJobOptions { retry_base_ms: 500, retry_cap_ms: 4000, ..Default::default() };
        let d0 = backoff_duration(0, &options).as_millis();
        let d5 = backoff_duration(5, &options).as_millis();
        assert!(d0 >= 500 && d0 < 700);
        assert!(d5 >= 4000 && d5 < 5100);
    }

    #[test]
    fn overall_progress_uses_byte_totals_when_known() {
        let client = Client::new();
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(block_on_open_cache(dir.path()));
        let (tx, _rx) = crate::events::event_channel(8);
        let queue = DownloadQueue::new(client, cache, DownloadJobOptions::default(), tx);
        assert!((queue.overall_progress(0, 4, Some((50, 200))) - 25.0).abs() < f64::EPSILON);
        assert!((queue.overall_progress(2, 4, None) - 50.0).abs() < f64::EPSILON);
    }

    fn block_on_open_cache(dir: &std::path::Path) -> ArtifactCache {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(async {
                ArtifactCache::open(crate::options::CacheOptions {
                    cache_root: dir.to_path_buf(),
                    max_size_bytes: 1_000_000,
                    eviction_target_ratio: 0.9,
                })
                .await
                .unwrap()
            })
    }
}
