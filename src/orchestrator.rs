//! Two-phase job orchestrator (spec 4.9/4.10): wires the resolver registry,
//! the artifact cache and the download queue together behind the event bus.
//! One `Orchestrator` instance runs at most one job at a time; a second
//! `start()` call while a job is active is rejected rather than queued,
//! mirroring the donor's single-flight `PackageInstaller::install` guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::artifact_cache::ArtifactCache;
use crate::coordinate::{Coordinate, Ecosystem};
use crate::download::queue::DownloadQueue;
use crate::error::{DepotError, Result};
use crate::events::{CompleteStats, Event, EventSender, FailedCoordinate, Phase};
use crate::model::download_item::{DownloadItem, DownloadStatus};
use crate::options::{DownloadJobOptions, ResolveOptions};
use crate::resolvers::{self, ResolverRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Resolving,
    Downloading,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

pub struct JobRequest {
    pub roots: Vec<(Ecosystem, String, String)>,
    pub resolve_options: ResolveOptions,
    pub download_options: DownloadJobOptions,
}

pub struct Orchestrator {
    registry: ResolverRegistry,
    cache: Arc<ArtifactCache>,
    client: reqwest::Client,
    events: EventSender,
    active: AtomicBool,
    cancel_token: std::sync::Mutex<Option<CancellationToken>>,
    queue: std::sync::Mutex<Option<Arc<DownloadQueue>>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(registry: ResolverRegistry, cache: Arc<ArtifactCache>, client: reqwest::Client, events: EventSender) -> Self {
        Self {
            registry,
            cache,
            client,
            events,
            active: AtomicBool::new(false),
            cancel_token: std::sync::Mutex::new(None),
            queue: std::sync::Mutex::new(None),
        }
    }

    pub fn cancel(&self) {
        if let Some(token) = self.cancel_token.lock().unwrap().as_ref() {
            token.cancel();
        }
        if let Some(queue) = self.queue.lock().unwrap().as_ref() {
            queue.cancel();
        }
    }

    pub fn pause(&self) {
        if let Some(queue) = self.queue.lock().unwrap().as_ref() {
            queue.pause();
        }
    }

    pub fn resume(&self) {
        if let Some(queue) = self.queue.lock().unwrap().as_ref() {
            queue.resume();
        }
    }

    /// Runs one resolve-then-download job to completion. Rejects a second
    /// concurrent call (spec 4.9's single-active-job invariant) rather than
    /// queuing it.
    pub async fn start(&self, request: JobRequest, output_path: String) -> Result<bool> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(DepotError::Internal("a job is already running on this orchestrator".to_string()));
        }
        let outcome = self.run(request, output_path).await;
        self.active.store(false, Ordering::SeqCst);
        *self.cancel_token.lock().unwrap() = None;
        *self.queue.lock().unwrap() = None;
        outcome
    }

    async fn run(&self, request: JobRequest, output_path: String) -> Result<bool> {
        let token = CancellationToken::new();
        *self.cancel_token.lock().unwrap() = Some(token.clone());
        let started = std::time::Instant::now();

        self.events.send(Event::Status { phase: Phase::Resolving, message: "resolution started".to_string() });

        let mut all_trees = Vec::new();
        let mut all_failed = Vec::new();
        let mut all_packages = Vec::new();

        // Roots share one DFS visited map per ecosystem (spec 4.4 step 1
        // applies the map per resolve() call), so roots are grouped by
        // ecosystem before dispatch rather than resolved one at a time.
        let mut by_ecosystem: HashMap<Ecosystem, Vec<(String, String)>> = HashMap::new();
        for (ecosystem, name, constraint) in &request.roots {
            by_ecosystem.entry(*ecosystem).or_default().push((name.clone(), constraint.clone()));
        }

        for (ecosystem, roots) in &by_ecosystem {
            if token.is_cancelled() {
                self.events.send(Event::Complete {
                    success: false,
                    output_path: output_path.clone(),
                    stats: CompleteStats::default(),
                });
                return Ok(false);
            }

            let Some(resolver) = self.registry.get(ecosystem) else {
                all_failed.extend(roots.iter().map(|(name, constraint)| FailedCoordinate {
                    coord: Coordinate::new(*ecosystem, name.clone(), constraint.clone()),
                    reason: "no resolver registered for ecosystem".to_string(),
                }));
                continue;
            };

            let result = resolvers::resolve(resolver.as_ref(), roots, &request.resolve_options).await?;
            all_trees.extend(result.trees);
            all_packages.extend(result.packages);
            all_failed.extend(result.failed.into_iter().map(|f| FailedCoordinate {
                coord: Coordinate::new(*ecosystem, f.coord_name, String::new()),
                reason: f.reason,
            }));
        }

        self.events.send(Event::DepsResolved {
            original: request.roots.iter().map(|(e, n, c)| Coordinate::new(*e, n.clone(), c.clone())).collect(),
            all: all_packages.iter().map(|p| p.coord.clone()).collect(),
            trees: all_trees,
            failed: all_failed.clone(),
        });

        if token.is_cancelled() {
            self.events.send(Event::Complete { success: false, output_path, stats: CompleteStats::default() });
            return Ok(false);
        }

        self.events.send(Event::Status { phase: Phase::Downloading, message: "download started".to_string() });

        let mut items = Vec::new();
        for package in &all_packages {
            let Some(url) = &package.url else { continue };
            if request.download_options.verify_checksums {
                if let Some(entry) = self.cache.lookup(&package.coord.canonical_key()).await {
                    if Some(&entry.checksum) == package.checksum.as_ref() && tokio::fs::try_exists(&entry.file_path).await.unwrap_or(false) {
                        continue;
                    }
                }
            }
            items.push(DownloadItem::new(package.coord.clone(), url.clone(), package.checksum.clone()));
        }

        let queue = Arc::new(DownloadQueue::new(self.client.clone(), self.cache.clone(), request.download_options.clone(), self.events.clone()));
        *self.queue.lock().unwrap() = Some(queue.clone());
        let total_items = items.len();
        queue.enqueue(items).await;

        let cancel_watch = {
            let queue = queue.clone();
            let token = token.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                queue.cancel();
            })
        };
        let finished = queue.start().await;
        cancel_watch.abort();

        let completed = finished.iter().filter(|i| i.status == DownloadStatus::Completed).count();
        let failed = finished.iter().filter(|i| i.status == DownloadStatus::Failed).count();
        let skipped = finished.iter().filter(|i| i.status == DownloadStatus::Skipped).count();
        let total_bytes: u64 = finished.iter().map(|i| i.bytes_done).sum();

        // A job is successful iff no required (non-optional) item is left in
        // `failed` at the terminal state (spec 4.11); a cancellation is
        // always reported as unsuccessful regardless of partial progress.
        let cancelled = token.is_cancelled();
        let success = !cancelled && failed == 0 && all_failed.is_empty();

        self.events.send(Event::Complete {
            success,
            output_path: output_path.clone(),
            stats: CompleteStats {
                total_items,
                completed,
                failed,
                skipped,
                duration_ms: started.elapsed().as_millis() as u64,
                total_bytes,
            },
        });

        Ok(success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_variants_are_distinct() {
        assert_ne!(JobState::Idle, JobState::Completed);
        assert_eq!(JobState::Paused, JobState::Paused);
    }
}
