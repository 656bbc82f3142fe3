//! PyPI metadata fetcher (spec 4.3). Adapted from the donor's
//! `PypiClient`/`PypiPackageResponse` response tree, trimmed to the fields
//! the resolver actually needs and rebuilt on top of the shared
//! `MetadataCache` instead of the donor's own ad hoc `update_cache`.

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
struct PypiResponse {
    info: PypiInfo,
    releases: HashMap<String, Vec<PypiReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct PypiInfo {
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
struct PypiReleaseFile {
    filename: String,
    url: String,
    #[serde(default)]
    python_version: Option<String>,
    #[serde(default)]
    yanked: bool,
    digests: PypiDigests,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct PypiDigests {
    sha256: Option<String>,
}

pub struct PypiFetcher {
    client: Client,
    registry_url: String,
    cache: Arc<MetadataCache>,
}

impl PypiFetcher {
    #[must_use]
    pub fn new(client: Client, cache: Arc<MetadataCache>) -> Self {
        Self {
            client,
            registry_url: "https://pypi.org".to_string(),
            cache,
        }
    }

    #[must_use]
    pub fn with_registry(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    async fn fetch(&self, name: &str) -> Result<PypiResponse> {
        let url = format!("{}/pypi/{}/json", self.registry_url, name);
        let client = self.client.clone();
        let fetch_url = url.clone();
        let bytes = self
            .cache
            .get_or_fetch("pip", &url, Duration::from_secs(600), || async move {
                get_bytes(&client, &fetch_url).await
            })
            .await?;
        serde_json::from_slice(&bytes).map_err(|e| DepotError::ParseError {
            context: format!("pypi json for {name}"),
            message: e.to_string(),
        })
    }

    pub async fn available_versions(&self, name: &str) -> Result<Vec<String>> {
        let resp = self.fetch(name).await?;
        Ok(resp.releases.into_keys().collect())
    }

    /// Dependencies declared by `requires_dist`, as `(RawDependency, marker)`
    /// pairs ready for the PEP 508 evaluator.
    pub async fn dependencies(&self, name: &str) -> Result<Vec<RawDependency>> {
        let resp = self.fetch(name).await?;
        Ok(resp
            .info
            .requires_dist
            .unwrap_or_default()
            .iter()
            .filter_map(|raw| parse_requires_dist(raw))
            .collect())
    }

    /// Selects the best download artifact for `version`: a wheel matching
    /// `python_tag` if one exists, falling back to the sdist otherwise
    /// (spec 4.3's PyPI fallback rule). Skips yanked files.
    pub async fn best_artifact(&self, name: &str, version: &str, python_tag: &str) -> Result<Option<ArtifactLocation>> {
        let resp = self.fetch(name).await?;
        let Some(files) = resp.releases.get(version) else {
            return Ok(None);
        };
        let candidates: Vec<&PypiReleaseFile> = files.iter().filter(|f| !f.yanked).collect();

        let wheel = candidates.iter().find(|f| {
            f.filename.ends_with(".whl")
                && f.python_version
                    .as_deref()
                    .map_or(true, |pv| pv == "py3" || pv.contains(python_tag) || pv == "source")
        });
        let chosen = wheel.or_else(|| candidates.iter().find(|f| f.filename.ends_with(".tar.gz")));

        Ok(chosen.map(|f| ArtifactLocation {
            url: f.url.clone(),
            checksum: f.digests.sha256.clone(),
            checksum_algorithm: f.digests.sha256.as_ref().map(|_| "sha256".to_string()),
        }))
    }
}

/// Parses one `requires_dist` entry: `name[extra1,extra2] (>=1,<2); marker`.
/// Returns `None` for malformed entries rather than failing the whole fetch.
fn parse_requires_dist(raw: &str) -> Option<RawDependency> {
    let (spec_part, marker) = match raw.split_once(';') {
        Some((s, m)) => (s.trim(), Some(m.trim().to_string())),
        None => (raw.trim(), None),
    };

    let name_end = spec_part
        .find(|c: char| c == '[' || c == '(' || c.is_whitespace() || "<>=!~".contains(c))
        .unwrap_or(spec_part.len());
    let name = spec_part[..name_end].trim().to_string();
    if name.is_empty() {
        return None;
    }

    let constraint_part = spec_part[name_end..].trim();
    let constraint = constraint_part
        .trim_start_matches(|c: char| c == '[' )
        .split(']')
        .last()
        .unwrap_or(constraint_part)
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
        .to_string();

    Some(RawDependency {
        name,
        constraint,
        optional: marker.as_deref().is_some_and(|m| m.contains("extra")),
        marker,
        scope: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_requirement() {
        let dep = parse_requires_dist("Werkzeug>=2.0").unwrap();
        assert_eq!(dep.name, "Werkzeug");
        assert_eq!(dep.constraint, ">=2.0");
        assert!(dep.marker.is_none());
    }

    #[test]
    fn parses_requirement_with_extras_and_marker() {
        let dep = parse_requires_dist("requests[security] (>=2.20.0); python_version >= '3.6'").unwrap();
        assert_eq!(dep.name, "requests");
        assert_eq!(dep.constraint, ">=2.20.0");
        assert_eq!(dep.marker.as_deref(), Some("python_version >= '3.6'"));
    }

    #[test]
    fn marks_optional_when_marker_gates_on_extra() {
        let dep = parse_requires_dist("black; extra == 'dev'").unwrap();
        assert!(dep.optional);
    }

    #[tokio::test]
    async fn fetches_and_caches_package_metadata() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "info": {"requires_dist": ["click>=7.0"]},
            "releases": {
                "2.0.0": [{
                    "filename": "flask-2.0.0-py3-none-any.whl",
                    "url": format!("{}/flask.whl", server.url()),
                    "python_version": "py3",
                    "yanked": false,
                    "digests": {"sha256": "deadbeef"}
                }]
            }
        });
        let mock = server
            .mock("GET", "/pypi/flask/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(1)
            .create_async()
            .await;

        let client = crate::fetchers::http_client::build_client(4);
        let cache = Arc::new(MetadataCache::new(None, 16));
        let fetcher = PypiFetcher::new(client, cache).with_registry(server.url());

        let deps = fetcher.dependencies("flask").await.unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "click");

        let artifact = fetcher.best_artifact("flask", "2.0.0", "py311").await.unwrap().unwrap();
        assert_eq!(artifact.checksum.as_deref(), Some("deadbeef"));

        // Second call should hit the metadata cache, not the mock again.
        let _ = fetcher.dependencies("flask").await.unwrap();
        mock.assert_async().await;
    }
}
