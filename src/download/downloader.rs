//! Per-item artifact downloader (spec 4.7): HTTP Range resume, incremental
//! checksum, atomic temp-file rename, checksum-mismatch-retry-once. Adapted
//! from the donor's `ParallelDownloader::download_with_progress` streaming
//! loop, rebuilt to write through a temp file instead of buffering the
//! whole body in memory and to share one real `ArtifactCache` instead of
//! the donor's per-task dummy `DownloadCache::new(100, 3600)`.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::cache::artifact_cache::ArtifactCache;
use crate::coordinate::Coordinate;
use crate::error::{DepotError, Result};
use crate::events::EventSender;
use crate::model::download_item::DownloadItem;

/// Outcome of one download attempt, distinct from `DownloadStatus` so the
/// queue's retry loop can tell a checksum failure (retryable once) from a
/// cache hit (no network work happened at all).
pub enum DownloadOutcome {
    Completed { bytes: u64, final_path: PathBuf },
    CacheHit { final_path: PathBuf },
}

/// Downloads one item into `cache`, resuming a partial temp file via HTTP
/// Range when present and the server advertises `Accept-Ranges: bytes`.
pub async fn download_item(
    client: &Client,
    cache: &ArtifactCache,
    item: &DownloadItem,
    filename: &str,
    events: &EventSender,
) -> Result<DownloadOutcome> {
    let final_path = cache.path_for(&item.coord, filename);

    if let Some(expected) = &item.expected_checksum {
        if let Some(entry) = cache.lookup(&item.coord.canonical_key()).await {
            if &entry.checksum == expected && tokio::fs::try_exists(&entry.file_path).await.unwrap_or(false) {
                return Ok(DownloadOutcome::CacheHit { final_path: entry.file_path });
            }
        }
    }

    tokio::fs::create_dir_all(final_path.parent().unwrap_or_else(|| Path::new("."))).await?;
    let temp_path = final_path.with_extension("part");

    let mut resume_from = 0u64;
    if let Ok(meta) = tokio::fs::metadata(&temp_path).await {
        resume_from = meta.len();
    }

    let mut request = client.get(&item.url);
    if resume_from > 0 {
        request = request.header("Range", format!("bytes={resume_from}-"));
    }

    let response = request.send().await.map_err(|source| DepotError::Network {
        coord: Some(item.coord.clone()),
        url: item.url.clone(),
        source,
    })?;

    let status = response.status();
    if status.is_client_error() {
        return Err(DepotError::Http4xx { url: item.url.clone(), status: status.as_u16() });
    }

    let resumed = status.as_u16() == 206;
    let bytes_total = response.content_length().unwrap_or(0) + if resumed { resume_from } else { 0 };

    let mut file = if resumed {
        tokio::fs::OpenOptions::new().append(true).open(&temp_path).await?
    } else {
        tokio::fs::File::create(&temp_path).await?
    };

    let mut hasher = Sha256::new();
    let mut bytes_done = 0u64;
    if resumed {
        let existing = tokio::fs::read(&temp_path).await?;
        hasher.update(&existing);
        bytes_done = resume_from;
    }

    let mut stream = response.bytes_stream();
    let mut last_emit = std::time::Instant::now();
    let mut last_emit_bytes = bytes_done;

    use tokio::io::AsyncWriteExt;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| DepotError::Network { coord: Some(item.coord.clone()), url: item.url.clone(), source })?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        bytes_done += chunk.len() as u64;

        if last_emit.elapsed().as_millis() >= 100 || bytes_done - last_emit_bytes >= 256 * 1024 {
            let elapsed = last_emit.elapsed().as_secs_f64().max(0.001);
            let speed = (bytes_done - last_emit_bytes) as f64 / elapsed;
            events.send(crate::events::Event::Progress {
                id: item.id.clone(),
                name: item.coord.name.clone(),
                version: item.coord.version.clone(),
                bytes_done,
                bytes_total,
                speed,
                percent: if bytes_total > 0 { (bytes_done as f64 / bytes_total as f64) * 100.0 } else { 0.0 },
            });
            last_emit = std::time::Instant::now();
            last_emit_bytes = bytes_done;
        }
    }
    file.flush().await?;
    drop(file);

    let actual_checksum = format!("{:x}", hasher.finalize());
    if let Some(expected) = &item.expected_checksum {
        if expected != &actual_checksum {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(DepotError::ChecksumMismatch {
                path: temp_path,
                expected: expected.clone(),
                actual: actual_checksum,
            });
        }
    }

    tokio::fs::rename(&temp_path, &final_path).await?;
    cache
        .insert(
            item.coord.canonical_key(),
            final_path.clone(),
            bytes_done,
            actual_checksum,
            "sha256".to_string(),
            item.coord.ecosystem.to_string(),
        )
        .await?;

    Ok(DownloadOutcome::Completed { bytes: bytes_done, final_path })
}

/// Filename portion of a URL, falling back to the coordinate's sanitized
/// name when the URL has no path segment worth keeping (e.g. a manifest API
/// endpoint rather than a direct artifact link).
#[must_use]
pub fn filename_for(url: &str, coord: &Coordinate) -> String {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}", coord.sanitized_name(), coord.version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_for_extracts_last_url_segment() {
        let coord = Coordinate::new(crate::coordinate::Ecosystem::Npm, "left-pad", "1.3.0");
        assert_eq!(filename_for("https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz", &coord), "left-pad-1.3.0.tgz");
    }

    #[test]
    fn filename_for_falls_back_when_url_has_no_segment() {
        let coord = Coordinate::new(crate::coordinate::Ecosystem::Docker, "alpine", "3.19");
        assert_eq!(filename_for("", &coord), "alpine-3.19");
    }
}
