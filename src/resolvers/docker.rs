//! Docker/OCI resolver (spec 4.1's `docker` ecosystem note): a leaf
//! resolver only — an image reference resolves to a single manifest digest
//! with no transitive dependency graph, so `dependencies` always returns
//! empty and the shared DFS terminates immediately after the root.

use crate::coordinate::Ecosystem;
use crate::error::Result;
use crate::fetchers::http_client::get_bytes;
use crate::options::ResolveOptions;
use crate::resolvers::{EcosystemResolver, FilteredDependency};

pub struct DockerResolver {
    client: reqwest::Client,
    registry_url: String,
}

impl DockerResolver {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, registry_url: "https://registry-1.docker.io".to_string() }
    }

    #[must_use]
    pub fn with_registry(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    fn manifest_url(&self, name: &str, reference: &str) -> String {
        format!("{}/v2/{name}/manifests/{reference}", self.registry_url)
    }
}

#[async_trait::async_trait]
impl EcosystemResolver for DockerResolver {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Docker
    }

    /// A docker "constraint" is the tag or digest itself; there is no
    /// version range grammar, so this just confirms the reference resolves
    /// (a HEAD-equivalent manifest fetch) and echoes it back.
    async fn select_version(&self, name: &str, constraint: &str) -> Result<Option<String>> {
        let reference = if constraint.is_empty() { "latest" } else { constraint };
        let url = self.manifest_url(name, reference);
        match get_bytes(&self.client, &url).await {
            Ok(_) => Ok(Some(reference.to_string())),
            Err(_) => Ok(None),
        }
    }

    async fn dependencies(&self, _name: &str, _version: &str, _options: &ResolveOptions) -> Result<Vec<FilteredDependency>> {
        Ok(Vec::new())
    }

    async fn artifact_url(&self, name: &str, version: &str) -> Result<(Option<String>, Option<String>, Option<String>)> {
        Ok((Some(self.manifest_url(name, version)), None, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_url_shapes_v2_api_path() {
        let resolver = DockerResolver::new(reqwest::Client::new()).with_registry("https://registry-1.docker.io");
        assert_eq!(
            resolver.manifest_url("library/alpine", "3.19"),
            "https://registry-1.docker.io/v2/library/alpine/manifests/3.19"
        );
    }
}
