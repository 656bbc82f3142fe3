//! Conda `repodata.json` fetcher (spec 4.3). Record shape grounded on the
//! retrieval pack's `rattler_conda_types::repo_data` module
//! (`RepoData{info,packages,conda_packages}` / `PackageRecord`); decoding is
//! new since nothing in the donor or pack fetches or decompresses a conda
//! channel index.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::cache::metadata_cache::MetadataCache;
use crate::error::{DepotError, Result};
use crate::fetchers::http_client::get_bytes;
use crate::fetchers::{ArtifactLocation, RawDependency};

#[derive(Debug, Deserialize, Default)]
struct RepoData {
    #[serde(default)]
    packages: HashMap<String, PackageRecord>,
    #[serde(default, rename = "packages.conda")]
    conda_packages: HashMap<String, PackageRecord>,
}

#[derive(Debug, Deserialize, Clone)]
struct PackageRecord {
    name: String,
    version: String,
    build: String,
    build_number: u64,
    #[serde(default)]
    depends: Vec<String>,
    subdir: String,
    #[serde(default)]
    sha256: Option<String>,
}

pub struct CondaFetcher {
    client: Client,
    channel_url: String,
    subdir: String,
    cache: Arc<MetadataCache>,
}

impl CondaFetcher {
    #[must_use]
    pub fn new(client: Client, cache: Arc<MetadataCache>) -> Self {
        Self {
            client,
            channel_url: "https://conda.anaconda.org/conda-forge".to_string(),
            subdir: "linux-64".to_string(),
            cache,
        }
    }

    #[must_use]
    pub fn with_channel(mut self, url: impl Into<String>) -> Self {
        self.channel_url = url.into();
        self
    }

    #[must_use]
    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }

    /// Fetches the zstd-compressed index, falling back to the plain JSON
    /// form when the channel doesn't publish a `.zst` copy.
    async fn fetch_index(&self) -> Result<RepoData> {
        let base = format!("{}/{}", self.channel_url, self.subdir);
        let client = self.client.clone();
        let zst_url = format!("{base}/repodata.json.zst");
        let cache_key = format!("{base}/repodata.json");

        let bytes = self
            .cache
            .get_or_fetch("conda", &cache_key, Duration::from_secs(3600), move || async move {
                match get_bytes(&client, &zst_url).await {
                    Ok(compressed) => zstd::stream::decode_all(compressed.as_slice()).map_err(|e| DepotError::ParseError {
                        context: "repodata.json.zst".to_string(),
                        message: e.to_string(),
                    }),
                    Err(_) => {
                        let plain_url = format!("{base}/repodata.json");
                        get_bytes(&client, &plain_url).await
                    }
                }
            })
            .await?;

        serde_json::from_slice(&bytes).map_err(|e| DepotError::ParseError {
            context: "repodata.json".to_string(),
            message: e.to_string(),
        })
    }

    fn find_record<'a>(index: &'a RepoData, name: &str, version: &str) -> Option<(&'a String, &'a PackageRecord)> {
        index
            .conda_packages
            .iter()
            .chain(index.packages.iter())
            .filter(|(_, r)| r.name == name && r.version == version)
            .max_by_key(|(_, r)| r.build_number)
    }

    pub async fn available_versions(&self, name: &str) -> Result<Vec<String>> {
        let index = self.fetch_index().await?;
        let mut versions: Vec<String> = index
            .conda_packages
            .values()
            .chain(index.packages.values())
            .filter(|r| r.name == name)
            .map(|r| r.version.clone())
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// `(version, build)` pairs for every record of `name`, used by the
    /// resolver to filter candidates by Python build-tag compatibility
    /// before picking the highest satisfying version (spec 4.4's conda
    /// note).
    pub async fn available_builds(&self, name: &str) -> Result<Vec<(String, String)>> {
        let index = self.fetch_index().await?;
        Ok(index
            .conda_packages
            .values()
            .chain(index.packages.values())
            .filter(|r| r.name == name)
            .map(|r| (r.version.clone(), r.build.clone()))
            .collect())
    }

    /// Declared dependencies for the highest-`build_number` record matching
    /// `(name, version)`. Each `depends` entry is `"name constraint"` or a
    /// bare name (spec 4.3's conda notes); constraint-free entries resolve
    /// to any available version.
    pub async fn dependencies(&self, name: &str, version: &str) -> Result<Vec<RawDependency>> {
        let index = self.fetch_index().await?;
        let Some((_, record)) = Self::find_record(&index, name, version) else {
            return Ok(Vec::new());
        };
        Ok(record.depends.iter().filter_map(|d| parse_depends_entry(d)).collect())
    }

    pub async fn artifact(&self, name: &str, version: &str) -> Result<Option<ArtifactLocation>> {
        let index = self.fetch_index().await?;
        let Some((filename, record)) = Self::find_record(&index, name, version) else {
            return Ok(None);
        };
        Ok(Some(ArtifactLocation {
            url: format!("{}/{}/{}", self.channel_url, record.subdir, filename),
            checksum: record.sha256.clone(),
            checksum_algorithm: record.sha256.as_ref().map(|_| "sha256".to_string()),
        }))
    }
}

/// Splits a conda `depends` entry on the first whitespace run: `"numpy
/// >=1.20,<2"` -> name `numpy`, constraint `>=1.20,<2`. A bare name has no
/// constraint and matches any build.
fn parse_depends_entry(entry: &str) -> Option<RawDependency> {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.split_once(char::is_whitespace) {
        Some((name, constraint)) => Some(RawDependency::required(name, constraint.trim())),
        None => Some(RawDependency::required(trimmed, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name_with_no_constraint() {
        let dep = parse_depends_entry("python").unwrap();
        assert_eq!(dep.name, "python");
        assert_eq!(dep.constraint, "");
    }

    #[test]
    fn parses_name_and_version_constraint() {
        let dep = parse_depends_entry("numpy >=1.20,<2").unwrap();
        assert_eq!(dep.name, "numpy");
        assert_eq!(dep.constraint, ">=1.20,<2");
    }

    #[tokio::test]
    async fn falls_back_to_plain_json_when_zst_missing() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/conda-forge/linux-64/repodata.json.zst").with_status(404).create_async().await;
        let body = serde_json::json!({
            "packages.conda": {
                "numpy-1.24.0-py311h1234.conda": {
                    "name": "numpy",
                    "version": "1.24.0",
                    "build": "py311h1234",
                    "build_number": 0,
                    "depends": ["python >=3.11,<3.12"],
                    "subdir": "linux-64",
                    "sha256": "abc"
                }
            }
        });
        server
            .mock("GET", "/conda-forge/linux-64/repodata.json")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = crate::fetchers::http_client::build_client(4);
        let cache = Arc::new(MetadataCache::new(None, 16));
        let fetcher = CondaFetcher::new(client, cache).with_channel(server.url());

        let deps = fetcher.dependencies("numpy", "1.24.0").await.unwrap();
        assert_eq!(deps[0].name, "python");

        let artifact = fetcher.artifact("numpy", "1.24.0").await.unwrap().unwrap();
        assert!(artifact.url.ends_with("numpy-1.24.0-py311h1234.conda"));
    }
}
