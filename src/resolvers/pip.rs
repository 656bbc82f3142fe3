//! pip resolver: PyPI metadata plus PEP 440 version selection and PEP 508
//! marker filtering (spec 4.1/4.2/4.3).

use crate::coordinate::Ecosystem;
use crate::error::Result;
use crate::fetchers::pypi::PypiFetcher;
use crate::markers::pep508::{self, MarkerEnvironment};
use crate::options::ResolveOptions;
use crate::resolvers::{EcosystemResolver, FilteredDependency};
use crate::version::{self, VersionScheme};

pub struct PipResolver {
    fetcher: PypiFetcher,
    scheme: Box<dyn VersionScheme + Send + Sync>,
    env: MarkerEnvironment,
}

impl PipResolver {
    #[must_use]
    pub fn new(fetcher: PypiFetcher, options: &ResolveOptions) -> Self {
        let env = pep508::environment_from_target(options.python_version.as_deref(), options.target_os.as_deref(), options.architecture.as_deref());
        Self { fetcher, scheme: version::scheme_for(Ecosystem::Pip), env }
    }
}

#[async_trait::async_trait]
impl EcosystemResolver for PipResolver {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Pip
    }

    async fn select_version(&self, name: &str, constraint: &str) -> Result<Option<String>> {
        let versions = self.fetcher.available_versions(name).await?;
        let refs: Vec<&str> = versions.iter().map(String::as_str).collect();
        let constraint = if constraint.is_empty() { "" } else { constraint };
        Ok(version::select_best(self.scheme.as_ref(), refs, constraint)?.map(str::to_string))
    }

    async fn dependencies(&self, name: &str, _version: &str, options: &ResolveOptions) -> Result<Vec<FilteredDependency>> {
        let raw = self.fetcher.dependencies(name).await?;
        raw.into_iter()
            .map(|dep| {
                let included = match &dep.marker {
                    Some(expr) => pep508::evaluate(expr, &self.env, options.strict_markers)?,
                    None => true,
                };
                Ok(FilteredDependency { raw: dep, included })
            })
            .collect()
    }

    async fn artifact_url(&self, name: &str, version: &str) -> Result<(Option<String>, Option<String>, Option<String>)> {
        let major = self.env.python_version.split('.').next().unwrap_or("3");
        let python_tag = format!("py{major}");
        let artifact = self.fetcher.best_artifact(name, version, &python_tag).await?;
        Ok(match artifact {
            Some(a) => (Some(a.url), a.checksum, a.checksum_algorithm),
            None => (None, None, None),
        })
    }
}
