//! npm packument fetcher (spec 4.3). Adapted from the donor's `NpmClient`
//! response types, trimmed to what resolution needs and generalized to use
//! `MetadataCache` instead of a bespoke in-struct cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::cache::metadata_cache::MetadataCache;
use crate::error::{DepotError, Result};
use crate::fetchers::http_client::get_bytes;
use crate::fetchers::{ArtifactLocation, RawDependency};

#[derive(Debug, Deserialize)]
struct NpmPackument {
    versions: HashMap<String, NpmVersionInfo>,
}

#[derive(Debug, Deserialize, Clone)]
struct NpmVersionInfo {
    #[serde(default)]
    dependencies: HashMap<String, String>,
    dist: NpmDistInfo,
}

#[derive(Debug, Deserialize, Clone)]
struct NpmDistInfo {
    tarball: String,
    #[serde(default)]
    shasum: Option<String>,
    #[serde(default)]
    integrity: Option<String>,
}

pub struct NpmFetcher {
    client: Client,
    registry_url: String,
    cache: Arc<MetadataCache>,
}

impl NpmFetcher {
    #[must_use]
    pub fn new(client: Client, cache: Arc<MetadataCache>) -> Self {
        Self {
            client,
            registry_url: "https://registry.npmjs.org".to_string(),
            cache,
        }
    }

    #[must_use]
    pub fn with_registry(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    async fn fetch(&self, name: &str) -> Result<NpmPackument> {
        let url = format!("{}/{}", self.registry_url, name);
        let client = self.client.clone();
        let fetch_url = url.clone();
        let bytes = self
            .cache
            .get_or_fetch("npm", &url, Duration::from_secs(600), || async move {
                get_bytes(&client, &fetch_url).await
            })
            .await?;
        serde_json::from_slice(&bytes).map_err(|e| DepotError::ParseError {
            context: format!("npm packument for {name}"),
            message: e.to_string(),
        })
    }

    pub async fn available_versions(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.fetch(name).await?.versions.into_keys().collect())
    }

    pub async fn dependencies(&self, name: &str, version: &str) -> Result<Vec<RawDependency>> {
        let packument = self.fetch(name).await?;
        let Some(v) = packument.versions.get(version) else {
            return Ok(Vec::new());
        };
        Ok(v.dependencies
            .iter()
            .map(|(dep_name, range)| RawDependency::required(dep_name.clone(), range.clone()))
            .collect())
    }

    pub async fn artifact(&self, name: &str, version: &str) -> Result<Option<ArtifactLocation>> {
        let packument = self.fetch(name).await?;
        Ok(packument.versions.get(version).map(|v| {
            let (checksum, algorithm) = integrity_or_shasum(&v.dist);
            ArtifactLocation {
                url: v.dist.tarball.clone(),
                checksum,
                checksum_algorithm: algorithm,
            }
        }))
    }
}

/// Prefers the SRI `integrity` field (e.g. `sha512-...`) over the legacy
/// `shasum` hex digest, per spec 4.3's "pick dist.tarball and dist.integrity
/// / dist.shasum".
fn integrity_or_shasum(dist: &NpmDistInfo) -> (Option<String>, Option<String>) {
    if let Some(integrity) = &dist.integrity {
        if let Some((algo, value)) = integrity.split_once('-') {
            return (Some(value.to_string()), Some(algo.to_string()));
        }
    }
    dist.shasum.clone().map_or((None, None), |s| (Some(s), Some("sha1".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_dependencies_and_artifact() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "versions": {
                "4.18.2": {
                    "dependencies": {"body-parser": "1.20.1"},
                    "dist": {
                        "tarball": format!("{}/express-4.18.2.tgz", server.url()),
                        "integrity": "sha512-abc123"
                    }
                }
            }
        });
        server
            .mock("GET", "/express")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = crate::fetchers::http_client::build_client(4);
        let cache = Arc::new(MetadataCache::new(None, 16));
        let fetcher = NpmFetcher::new(client, cache).with_registry(server.url());

        let deps = fetcher.dependencies("express", "4.18.2").await.unwrap();
        assert_eq!(deps[0].name, "body-parser");

        let artifact = fetcher.artifact("express", "4.18.2").await.unwrap().unwrap();
        assert_eq!(artifact.checksum_algorithm.as_deref(), Some("sha512"));
    }
}
