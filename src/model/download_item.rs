//! `DownloadItem`: the unit owned by the download queue.

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
    Skipped,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadItem {
    pub id: String,
    pub coord: Coordinate,
    pub url: String,
    pub expected_checksum: Option<String>,
    pub status: DownloadStatus,
    pub bytes_total: u64,
    pub bytes_done: u64,
    pub speed: f64,
    pub retry_count: u32,
    pub error: Option<ErrorKind>,
    /// Smaller-first priority bucket within a batch, to minimize tail latency
    /// (spec 4.6); populated from `bytes_total` once known, else 0.
    pub priority_hint: u64,
}

impl DownloadItem {
    #[must_use]
    pub fn new(coord: Coordinate, url: String, expected_checksum: Option<String>) -> Self {
        Self {
            id: format!("{}#{}", coord.canonical_key(), uuid_like()),
            coord,
            url,
            expected_checksum,
            status: DownloadStatus::Pending,
            bytes_total: 0,
            bytes_done: 0,
            speed: 0.0,
            retry_count: 0,
            error: None,
            priority_hint: 0,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Completed | DownloadStatus::Skipped | DownloadStatus::Failed
        )
    }

    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.bytes_total == 0 {
            if self.status == DownloadStatus::Completed { 100.0 } else { 0.0 }
        } else {
            (self.bytes_done as f64 / self.bytes_total as f64) * 100.0
        }
    }
}

/// Not a real UUID generator (no external crate pulled in just for this);
/// good enough to disambiguate items sharing a canonical key within one job.
fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("{:x}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Ecosystem;

    #[test]
    fn completed_with_zero_total_is_full_percent() {
        let mut item = DownloadItem::new(
            Coordinate::new(Ecosystem::Pip, "empty-pkg", "0.0.1"),
            "https://example.test/empty".into(),
            None,
        );
        item.status = DownloadStatus::Completed;
        assert!((item.progress_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_percent_tracks_bytes() {
        let mut item = DownloadItem::new(
            Coordinate::new(Ecosystem::Pip, "pkg", "1.0.0"),
            "https://example.test/pkg".into(),
            None,
        );
        item.bytes_total = 200;
        item.bytes_done = 50;
        assert!((item.progress_percent() - 25.0).abs() < f64::EPSILON);
    }
}
