//! npm resolver (spec 4.1/4.4): semver range selection over the npm
//! registry. Hoisting into a `node_modules`-shaped tree is the flattener's
//! job (`DependencyNode::flatten` plus the dedicated hoisting pass below);
//! `dependencies`/`select_version` here only need to satisfy the shared DFS.

use crate::coordinate::Ecosystem;
use crate::error::Result;
use crate::fetchers::npm::NpmFetcher;
use crate::model::dependency::DependencyNode;
use crate::options::ResolveOptions;
use crate::resolvers::{EcosystemResolver, FilteredDependency};
use crate::version::{self, VersionScheme};

pub struct NpmResolver {
    fetcher: NpmFetcher,
    scheme: Box<dyn VersionScheme + Send + Sync>,
}

impl NpmResolver {
    #[must_use]
    pub fn new(fetcher: NpmFetcher) -> Self {
        Self { fetcher, scheme: version::scheme_for(Ecosystem::Npm) }
    }
}

#[async_trait::async_trait]
impl EcosystemResolver for NpmResolver {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    async fn select_version(&self, name: &str, constraint: &str) -> Result<Option<String>> {
        let versions = self.fetcher.available_versions(name).await?;
        let refs: Vec<&str> = versions.iter().map(String::as_str).collect();
        let constraint = if constraint.is_empty() { "*" } else { constraint };
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

/// One entry in the `node_modules`-shaped hoisting result: a name placed
/// either at the top level or nested under a specific parent path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoistedPlacement {
    pub name: String,
    pub version: String,
    pub parent_path: Vec<String>,
}

/// Builds the hoisted placement list alongside the flat list (spec 4.4's npm
/// note): a name is hoisted to the top level the first time it is seen;
/// later occurrences at a different version are nested under their
/// immediate parent and recorded as a `version-mismatch` by the DFS driver
/// (that conflict bookkeeping happens during `resolve`, not here — this
/// function only decides placement for an already-resolved tree).
#[must_use]
pub fn hoist(trees: &[DependencyNode]) -> Vec<HoistedPlacement> {
    let mut top_level: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    let mut placements = Vec::new();
    for tree in trees {
        hoist_node(tree, &[], &mut top_level, &mut placements);
    }
    placements
}

fn hoist_node(
    node: &DependencyNode,
    parent_path: &[String],
    top_level: &mut std::collections::HashMap<String, String>,
    placements: &mut Vec<HoistedPlacement>,
) {
    if node.cycle || node.system_skip {
        return;
    }
    let name = node.coord.name.clone();
    let placed_path = match top_level.get(&name) {
        Some(existing_version) if existing_version == &node.coord.version => Vec::new(),
        Some(_) => parent_path.to_vec(),
        None => {
            top_level.insert(name.clone(), node.coord.version.clone());
            Vec::new()
        }
    };
    placements.push(HoistedPlacement { name: name.clone(), version: node.coord.version.clone(), parent_path: placed_path.clone() });

    let child_parent_path = if placed_path.is_empty() {
        let mut p = parent_path.to_vec();
        p.push(name);
        p
    } else {
        let mut p = placed_path;
        p.push(name);
        p
    };
    for child in &node.children {
        hoist_node(child, &child_parent_path, top_level, placements);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Coordinate;

    #[test]
    fn first_occurrence_is_hoisted_to_top_level() {
        let mut root = DependencyNode::leaf(Coordinate::new(Ecosystem::Npm, "app", "1.0.0"));
        root.children.push(DependencyNode::leaf(Coordinate::new(Ecosystem::Npm, "lodash", "4.17.21")));
        let placements = hoist(&[root]);
        let lodash = placements.iter().find(|p| p.name == "lodash").unwrap();
        assert!(lodash.parent_path.is_empty());
    }

    #[test]
    fn conflicting_version_is_nested_under_its_parent() {
        let mut root = DependencyNode::leaf(Coordinate::new(Ecosystem::Npm, "app", "1.0.0"));
        let mut a = DependencyNode::leaf(Coordinate::new(Ecosystem::Npm, "a", "1.0.0"));
        a.children.push(DependencyNode::leaf(Coordinate::new(Ecosystem::Npm, "lodash", "3.0.0")));
        root.children.push(DependencyNode::leaf(Coordinate::new(Ecosystem::Npm, "lodash", "4.17.21")));
        root.children.push(a);
        let placements = hoist(&[root]);
        let nested = placements.iter().find(|p| p.name == "lodash" && p.version == "3.0.0").unwrap();
        assert_eq!(nested.parent_path, vec!["a".to_string()]);
    }
}
