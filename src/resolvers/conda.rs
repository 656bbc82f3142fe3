//! Conda resolver (spec 4.4): version selection filtered to builds
//! compatible with the requested Python tag, falling back to the Anaconda
//! per-label API (RC channels) when no compatible build remains in the
//! default channel index.

use crate::coordinate::Ecosystem;
use crate::error::Result;
use crate::fetchers::conda::CondaFetcher;
use crate::fetchers::http_client::get_bytes;
use crate::markers::conda_build_tag;
use crate::options::ResolveOptions;
use crate::resolvers::{EcosystemResolver, FilteredDependency};
use crate::version::{self, VersionScheme};

pub struct CondaResolver {
    fetcher: CondaFetcher,
    scheme: Box<dyn VersionScheme + Send + Sync>,
    python_version: String,
    client: reqwest::Client,
    fallback_channel: String,
}

impl CondaResolver {
    #[must_use]
    pub fn new(fetcher: CondaFetcher, client: reqwest::Client, options: &ResolveOptions) -> Self {
        Self {
            fetcher,
            scheme: version::scheme_for(Ecosystem::Conda),
            python_version: options.python_version.clone().unwrap_or_else(|| "3.11".to_string()),
            client,
            fallback_channel: "https://conda.anaconda.org/conda-forge/label/rc".to_string(),
        }
    }

    /// Versions available for `name` on the RC label, probed directly
    /// rather than through `MetadataCache` since this is an exceptional
    /// fallback path, not a hot one.
    async fn fallback_versions(&self, name: &str, subdir: &str) -> Vec<String> {
        let url = format!("{}/{}/repodata.json", self.fallback_channel, subdir);
        let Ok(bytes) = get_bytes(&self.client, &url).await else {
            return Vec::new();
        };
        #[derive(serde::Deserialize)]
        struct Minimal {
            #[serde(default)]
            packages: std::collections::HashMap<String, MinimalRecord>,
        }
        #[derive(serde::Deserialize)]
        struct MinimalRecord {
            name: String,
            version: String,
        }
        serde_json::from_slice::<Minimal>(&bytes)
            .map(|idx| idx.packages.into_values().filter(|r| r.name == name).map(|r| r.version).collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl EcosystemResolver for CondaResolver {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Conda
    }

    async fn select_version(&self, name: &str, constraint: &str) -> Result<Option<String>> {
        let builds = self.fetcher.available_builds(name).await?;
        let compatible: Vec<&str> = builds
            .iter()
            .filter(|(_, build)| conda_build_tag::build_matches(build, &self.python_version))
            .map(|(version, _)| version.as_str())
            .collect();

        if let Some(chosen) = version::select_best(self.scheme.as_ref(), compatible, constraint)? {
            return Ok(Some(chosen.to_string()));
        }

        let fallback = self.fallback_versions(name, "noarch").await;
        let refs: Vec<&str> = fallback.iter().map(String::as_str).collect();
        Ok(version::select_best(self.scheme.as_ref(), refs, constraint)?.map(str::to_string))
    }

    async fn dependencies(&self, name: &str, version: &str, _options: &ResolveOptions) -> Result<Vec<FilteredDependency>> {
        let raw = self.fetcher.dependencies(name, version).await?;
        Ok(raw.into_iter().map(|raw| FilteredDependency { raw, included: true }).collect())
    }

    async fn artifact_url(&self, name: &str, version: &str) -> Result<(Option<String>, Option<String>, Option<String>)> {
        let artifact = self.fetcher.artifact(name, version).await?;
        Ok(match artifact {
            Some(a) => (Some(a.url), a.checksum, a.checksum_algorithm),
            None => (None, None, None),
        })
    }
}
