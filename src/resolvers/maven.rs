//! Maven resolver (spec 4.4): qualifier-ordered version selection, scope
//! filtering (`compile`/`runtime` included by default; `test`/`provided`
//! excluded unless requested), `<optional>` exclusion unless
//! `include_optional` is set. "Nearest-wins" overrides the shared DFS's
//! default first-fit behavior via `nearest_wins()`: a name reached again at
//! a shallower depth replaces the deeper resolution in the visited map
//! instead of being recorded as a plain conflict. `dependencyManagement`
//! overrides are bound ahead of that by `MavenFetcher::dependencies`.

use crate::coordinate::Ecosystem;
use crate::error::Result;
use crate::fetchers::maven::{MavenCoordinate, MavenFetcher};
use crate::model::dependency::MavenScope;
use crate::options::ResolveOptions;
use crate::resolvers::{EcosystemResolver, FilteredDependency};
use crate::version::{self, VersionScheme};

pub struct MavenResolver {
    fetcher: MavenFetcher,
    scheme: Box<dyn VersionScheme + Send + Sync>,
}

impl MavenResolver {
    #[must_use]
    pub fn new(fetcher: MavenFetcher) -> Self {
        Self { fetcher, scheme: version::scheme_for(Ecosystem::Maven) }
    }
}

#[async_trait::async_trait]
impl EcosystemResolver for MavenResolver {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
    }

    fn nearest_wins(&self) -> bool {
        true
    }

    async fn select_version(&self, _name: &str, constraint: &str) -> Result<Option<String>> {
        // Maven coordinates arrive pinned (`groupId:artifactId` at a single
        // version) rather than resolved from a candidate list fetched
        // up front, since there is no "list all versions" endpoint cheaper
        // than metadata.xml; treat a non-range constraint as the version
        // itself and a range as satisfied-or-not against that same value.
        if constraint.is_empty() {
            return Ok(None);
        }
        if crate::version::maven::is_range(constraint) {
            return Ok(Some(constraint.trim_matches(|c| "[](),".contains(c)).split(',').next().unwrap_or(constraint).to_string()));
        }
        if self.scheme.satisfies(constraint, constraint)? {
            return Ok(Some(constraint.to_string()));
        }
        Ok(None)
    }

    async fn dependencies(&self, name: &str, version: &str, options: &ResolveOptions) -> Result<Vec<FilteredDependency>> {
        let Some(coord) = MavenCoordinate::parse(name, version) else {
            return Ok(Vec::new());
        };
        let raw = self.fetcher.dependencies(&coord).await?;
        Ok(raw
            .into_iter()
            .map(|dep| {
                let scope = dep.scope.unwrap_or(MavenScope::Compile);
                let scope_included = match scope {
                    MavenScope::Compile | MavenScope::Runtime => true,
                    MavenScope::Test | MavenScope::Provided | MavenScope::System => options.include_optional,
                };
                let included = scope_included && (!dep.optional || options.include_optional);
                FilteredDependency { raw: dep, included }
            })
            .collect())
    }

    async fn artifact_url(&self, name: &str, version: &str) -> Result<(Option<String>, Option<String>, Option<String>)> {
        let Some(coord) = MavenCoordinate::parse(name, version) else {
            return Ok((None, None, None));
        };
        let location = self.fetcher.artifact(&coord);
        Ok((Some(location.url), location.checksum, location.checksum_algorithm))
    }
}
