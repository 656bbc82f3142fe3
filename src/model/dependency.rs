//! Resolution-tree data model: `DependencyNode`, `ResolutionResult`, `Conflict`.

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MavenScope {
    Compile,
    Runtime,
    Provided,
    Test,
    System,
}

/// One node in a resolution tree. Owned exclusively by its parent; the flat
/// `packages` list in `ResolutionResult` references coordinates, not nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyNode {
    pub coord: Coordinate,
    pub children: Vec<DependencyNode>,
    pub optional: bool,
    pub scope: Option<MavenScope>,
    /// Result of evaluating a PEP 508 marker for this node (pip only).
    pub marker: Option<bool>,
    /// Set when this node is a cycle stub: coordinate only, no recursion,
    /// indistinguishable from a true leaf except for this flag (design note 9).
    #[serde(default)]
    pub cycle: bool,
    /// Set when this node represents a system/platform package the resolver
    /// deliberately did not recurse into (spec 4.4 step 3).
    #[serde(default)]
    pub system_skip: bool,
}

impl DependencyNode {
    #[must_use]
    pub fn leaf(coord: Coordinate) -> Self {
        Self {
            coord,
            children: Vec::new(),
            optional: false,
            scope: None,
            marker: None,
            cycle: false,
            system_skip: false,
        }
    }

    #[must_use]
    pub fn cycle_stub(coord: Coordinate) -> Self {
        Self {
            cycle: true,
            ..Self::leaf(coord)
        }
    }

    #[must_use]
    pub fn system_skip_node(coord: Coordinate) -> Self {
        Self {
            system_skip: true,
            ..Self::leaf(coord)
        }
    }

    /// Pre-order flatten, unique by `(name, version)`, excluding system and
    /// cycle stubs (spec 4.4 step 4).
    #[must_use]
    pub fn flatten(&self) -> Vec<Coordinate> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        self.flatten_into(&mut seen, &mut out);
        out
    }

    fn flatten_into(&self, seen: &mut std::collections::HashSet<String>, out: &mut Vec<Coordinate>) {
        if !self.cycle && !self.system_skip && seen.insert(self.coord.canonical_key()) {
            out.push(self.coord.clone());
        }
        for child in &self.children {
            child.flatten_into(seen, out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    VersionMismatch,
    Missing,
    Circular,
    MarkerFiltered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ConflictType,
    pub versions: Vec<String>,
    pub requested_by: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedResolution {
    pub coord_name: String,
    pub reason: String,
}

/// A resolved package as it will be handed to the download queue: its
/// coordinate plus whatever URL/checksum the metadata fetcher could resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub coord: Coordinate,
    pub url: Option<String>,
    pub checksum: Option<String>,
    pub checksum_algorithm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub trees: Vec<DependencyNode>,
    pub packages: Vec<ResolvedPackage>,
    pub conflicts: Vec<Conflict>,
    pub failed: Vec<FailedResolution>,
    pub max_depth_reached: bool,
    pub resolution_time_ms: u64,
}

impl ResolutionResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Ecosystem;

    fn coord(name: &str, version: &str) -> Coordinate {
        Coordinate::new(Ecosystem::Npm, name, version)
    }

    #[test]
    fn flatten_excludes_cycle_and_system_stubs() {
        let mut root = DependencyNode::leaf(coord("a", "1.0.0"));
        root.children.push(DependencyNode::leaf(coord("b", "1.0.0")));
        root.children.push(DependencyNode::cycle_stub(coord("a", "1.0.0")));
        root.children.push(DependencyNode::system_skip_node(coord("libc", "0")));

        let flat = root.flatten();
        assert_eq!(flat.len(), 2);
        assert!(flat.iter().any(|c| c.name == "a"));
        assert!(flat.iter().any(|c| c.name == "b"));
    }

    #[test]
    fn flatten_dedupes_same_name_and_version() {
        let mut root = DependencyNode::leaf(coord("a", "1.0.0"));
        root.children.push(DependencyNode::leaf(coord("b", "1.0.0")));
        root.children.push(DependencyNode::leaf(coord("b", "1.0.0")));
        assert_eq!(root.flatten().len(), 2);
    }
}
