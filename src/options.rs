//! Runtime configuration structs. These are plain, serde-deserializable, and
//! carry the documented defaults from the design (concurrency, depth, TTLs).
//! Persistence to/from a config file is a caller concern, not this crate's.

use serde::{Deserialize, Serialize};

fn default_max_depth() -> u32 {
    10
}
fn default_metadata_concurrency() -> usize {
    8
}
fn default_download_concurrency() -> usize {
    3
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_retry_cap_ms() -> u64 {
    30_000
}
fn default_cache_max_bytes() -> u64 {
    5 * 1024 * 1024 * 1024
}
fn default_eviction_target_ratio() -> f64 {
    0.90
}
fn default_redirect_cap() -> u8 {
    5
}
fn default_true() -> bool {
    true
}

/// Options accompanying a `resolve` request (spec 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    pub target_os: Option<String>,
    pub architecture: Option<String>,
    pub python_version: Option<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    pub include_optional: bool,
    pub channels: Vec<String>,
    pub registries: Vec<String>,
    #[serde(default = "default_metadata_concurrency")]
    pub metadata_concurrency: usize,
    /// Open question, resolved: a marker referencing an unsupported variable
    /// evaluates to false unless this is set, in which case it is a hard error.
    pub strict_markers: bool,
    /// Open question, resolved: yum weak dependencies are off by default.
    pub include_recommends: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            target_os: None,
            architecture: None,
            python_version: None,
            max_depth: default_max_depth(),
            include_optional: false,
            channels: Vec::new(),
            registries: Vec::new(),
            metadata_concurrency: default_metadata_concurrency(),
            strict_markers: false,
            include_recommends: false,
        }
    }
}

/// Options accompanying a `download` job (spec 6, 4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadJobOptions {
    #[serde(default = "default_download_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_true")]
    pub verify_checksums: bool,
    #[serde(default = "default_true")]
    pub resolve_first: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_cap_ms")]
    pub retry_cap_ms: u64,
    #[serde(default = "default_redirect_cap")]
    pub redirect_cap: u8,
}

impl Default for DownloadJobOptions {
    fn default() -> Self {
        Self {
            concurrency: default_download_concurrency(),
            verify_checksums: true,
            resolve_first: true,
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_cap_ms: default_retry_cap_ms(),
            redirect_cap: default_redirect_cap(),
        }
    }
}

impl DownloadJobOptions {
    /// Valid concurrency range is 1-16 per spec 4.6; out-of-range values clamp.
    #[must_use]
    pub fn clamped_concurrency(&self) -> usize {
        self.concurrency.clamp(1, 16)
    }
}

/// Artifact cache sizing (spec 4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub cache_root: std::path::PathBuf,
    #[serde(default = "default_cache_max_bytes")]
    pub max_size_bytes: u64,
    #[serde(default = "default_eviction_target_ratio")]
    pub eviction_target_ratio: f64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache_root: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("depot"),
            max_size_bytes: default_cache_max_bytes(),
            eviction_target_ratio: default_eviction_target_ratio(),
        }
    }
}

/// Metadata fetcher TTLs (spec 4.3).
#[derive(Debug, Clone, Copy)]
pub struct MetadataTtls {
    pub pypi: std::time::Duration,
    pub npm: std::time::Duration,
    pub maven_pom: std::time::Duration,
    pub conda_repodata: std::time::Duration,
    pub yum_repomd: std::time::Duration,
}

impl Default for MetadataTtls {
    fn default() -> Self {
        use std::time::Duration;
        Self {
            pypi: Duration::from_secs(600),
            npm: Duration::from_secs(600),
            maven_pom: Duration::from_secs(3600),
            conda_repodata: Duration::from_secs(3600),
            yum_repomd: Duration::from_secs(600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_options_defaults_match_spec() {
        let o = ResolveOptions::default();
        assert_eq!(o.max_depth, 10);
        assert_eq!(o.metadata_concurrency, 8);
        assert!(!o.strict_markers);
        assert!(!o.include_recommends);
    }

    #[test]
    fn download_concurrency_clamps_to_range() {
        let mut o = DownloadJobOptions::default();
        o.concurrency = 0;
        assert_eq!(o.clamped_concurrency(), 1);
        o.concurrency = 64;
        assert_eq!(o.clamped_concurrency(), 16);
    }

    #[test]
    fn cache_options_default_size_is_five_gib() {
        let c = CacheOptions::default();
        assert_eq!(c.max_size_bytes, 5 * 1024 * 1024 * 1024);
    }
}
