//! yum/dnf resolver (spec 4.4): EVR version selection; `Requires` entries
//! that name a capability rather than a package are resolved against the
//! repo-wide `capability -> package` index built once per resolve via
//! `prepare()` — see `resolve_capability`.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::coordinate::Ecosystem;
use crate::error::Result;
use crate::fetchers::yum::YumFetcher;
use crate::options::ResolveOptions;
use crate::resolvers::{EcosystemResolver, FilteredDependency};
use crate::version::{self, VersionScheme};

pub struct YumResolver {
    fetcher: YumFetcher,
    scheme: Box<dyn VersionScheme + Send + Sync>,
    capability_index: RwLock<HashMap<String, String>>,
}

impl YumResolver {
    #[must_use]
    pub fn new(fetcher: YumFetcher) -> Self {
        Self {
            fetcher,
            scheme: version::scheme_for(Ecosystem::Yum),
            capability_index: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl EcosystemResolver for YumResolver {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Yum
    }

    async fn prepare(&self) -> Result<()> {
        let index = self.fetcher.provides_index().await?;
        *self.capability_index.write().await = index;
        Ok(())
    }

    async fn select_version(&self, name: &str, constraint: &str) -> Result<Option<String>> {
        let versions = self.fetcher.available_versions(name).await?;
        let refs: Vec<&str> = versions.iter().map(String::as_str).collect();
        let constraint = if constraint.is_empty() { "" } else { constraint };
        Ok(version::select_best(self.scheme.as_ref(), refs, constraint)?.map(str::to_string))
    }

    async fn dependencies(&self, name: &str, version: &str, options: &ResolveOptions) -> Result<Vec<FilteredDependency>> {
        let raw = self.fetcher.dependencies(name, version, options.include_recommends).await?;
        let index = self.capability_index.read().await;
        Ok(raw
            .into_iter()
            .map(|mut raw| {
                raw.name = resolve_capability(&raw.name, &index);
                FilteredDependency { raw, included: true }
            })
            .collect())
    }

    async fn artifact_url(&self, name: &str, version: &str) -> Result<(Option<String>, Option<String>, Option<String>)> {
        let artifact = self.fetcher.artifact(name, version).await?;
        Ok(match artifact {
            Some(a) => (Some(a.url), a.checksum, a.checksum_algorithm),
            None => (None, None, None),
        })
    }
}

/// Resolves a `Requires` entry that may be a capability string
/// (`libssl.so.1.1(LIBSSL_1_1)`) rather than a package name, against the
/// repo-wide `capability -> providing package name` index (spec 4.3/4.4's
/// yum notes). Returns the providing package's name, or `requirement`
/// unchanged if it already looks like a plain package name (no `.so` and no
/// parenthesised version tag).
#[must_use]
pub fn resolve_capability(requirement: &str, capability_index: &std::collections::HashMap<String, String>) -> String {
    if let Some(provider) = capability_index.get(requirement) {
        return provider.clone();
    }
    requirement.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_requirement_text_when_not_in_index() {
        let index = std::collections::HashMap::new();
        assert_eq!(resolve_capability("bash", &index), "bash");
    }

    #[test]
    fn resolves_capability_via_index() {
        let mut index = std::collections::HashMap::new();
        index.insert("libssl.so.1.1".to_string(), "openssl-libs".to_string());
        assert_eq!(resolve_capability("libssl.so.1.1", &index), "openssl-libs");
    }
}
