//! Shared resolver protocol and DFS first-fit algorithm (spec 4.4).
//!
//! Each ecosystem implements `EcosystemResolver` over its metadata fetcher;
//! `resolve_tree` then drives the shared DFS traversal once per root,
//! threading a single `visited` map and `conflicts` list across the whole
//! job. Grounded on the Maven `Ecosystem` trait pattern in the retrieval
//! pack's LSP-tooling example (one trait per ecosystem, a registry keyed by
//! ecosystem tag) generalized from "provide hover/completion" to "resolve
//! dependencies"; the donor's own `DependencyResolver` (BFS with hardcoded
//! mock responses) is not reused — it solves a different, much narrower
//! problem and is dropped in the final trim.

pub mod conda;
pub mod docker;
pub mod maven;
pub mod npm;
pub mod pip;
pub mod yum;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;

use crate::coordinate::{Coordinate, Ecosystem};
use crate::error::Result;
use crate::fetchers::RawDependency;
use crate::model::dependency::{Conflict, ConflictType, DependencyNode, ResolutionResult};
use crate::options::ResolveOptions;
use crate::version;

/// One resolvable dependency edge after ecosystem-specific filtering
/// (markers, platform/build tags, scope) has already been applied —
/// whatever survives is eligible for recursion.
#[derive(Debug, Clone)]
pub struct FilteredDependency {
    pub raw: RawDependency,
    /// `Some(false)` when a marker/filter excluded this edge outright; such
    /// entries are recorded as `marker-filtered` conflicts rather than
    /// recursed into.
    pub included: bool,
}

/// Per-ecosystem hook for the shared DFS driver. Implementations own their
/// metadata fetcher and know how to pick a version, list dependencies, and
/// classify a name as a system package.
#[async_trait::async_trait]
pub trait EcosystemResolver: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;

    /// Highest version satisfying `constraint`, or `None` if nothing matches.
    async fn select_version(&self, name: &str, constraint: &str) -> Result<Option<String>>;

    /// Declared dependencies of `(name, version)`, with ecosystem-specific
    /// filtering (markers, scope exclusion, build-tag compatibility)
    /// already applied.
    async fn dependencies(&self, name: &str, version: &str, options: &ResolveOptions) -> Result<Vec<FilteredDependency>>;

    /// Download location for a resolved `(name, version)`, if known.
    async fn artifact_url(&self, name: &str, version: &str) -> Result<(Option<String>, Option<String>, Option<String>)>;

    /// Whether the already-visited `version` still satisfies `constraint`
    /// (spec 4.4 step 3's reuse check). Backed by the ecosystem's own
    /// `VersionScheme::satisfies` by default; `select_version` is the wrong
    /// tool here because it returns the *highest* version matching a
    /// constraint, not whether one specific prior version matches it.
    async fn satisfies(&self, name: &str, version: &str, constraint: &str) -> Result<bool> {
        let _ = name;
        version::scheme_for(self.ecosystem()).satisfies(version, constraint)
    }

    /// True for ecosystems where a later, shallower request overrides an
    /// already-visited deeper one (Maven's "nearest-wins", spec 4.1/4.4).
    /// Every other ecosystem keeps first-fit: the first path to reach a name
    /// wins outright.
    fn nearest_wins(&self) -> bool {
        false
    }

    /// One-time async setup run before a resolver's roots are walked (yum
    /// uses this to build its repo-wide `capability -> package` index, spec
    /// 4.3/4.4, before any `dependencies()` call needs it). Default no-op.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }
}

struct DfsState {
    /// `name -> (resolved version, depth first reached)`. The depth is only
    /// consulted by `nearest_wins` ecosystems; everywhere else the first
    /// entry for a name is never overridden.
    visited: HashMap<String, (String, u32)>,
    conflicts: Vec<Conflict>,
    failed: Vec<crate::model::dependency::FailedResolution>,
    max_depth_reached: bool,
}

/// Runs the shared DFS first-fit algorithm (spec 4.4 steps 1-4) over one or
/// more root constraints, producing a tree per root plus the job-wide
/// conflict/failure lists.
pub async fn resolve(
    resolver: &dyn EcosystemResolver,
    roots: &[(String, String)],
    options: &ResolveOptions,
) -> Result<ResolutionResult> {
    let started = std::time::Instant::now();
    resolver.prepare().await?;
    let mut state = DfsState {
        visited: HashMap::new(),
        conflicts: Vec::new(),
        failed: Vec::new(),
        max_depth_reached: false,
    };

    let mut trees = Vec::new();
    for (name, constraint) in roots {
        let mut path = Vec::new();
        if let Some(node) = resolve_one(resolver, name, constraint, 0, &mut path, &mut state, options).await? {
            trees.push(node);
        }
    }

    let mut packages = Vec::new();
    let mut seen = HashSet::new();
    for tree in &trees {
        for coord in tree.flatten() {
            if seen.insert(coord.canonical_key()) {
                let (url, checksum, checksum_algorithm) = resolver.artifact_url(&coord.name, &coord.version).await?;
                packages.push(crate::model::dependency::ResolvedPackage { coord, url, checksum, checksum_algorithm });
            }
        }
    }

    Ok(ResolutionResult {
        trees,
        packages,
        conflicts: state.conflicts,
        failed: state.failed,
        max_depth_reached: state.max_depth_reached,
        resolution_time_ms: started.elapsed().as_millis() as u64,
    })
}

fn resolve_one<'a>(
    resolver: &'a dyn EcosystemResolver,
    name: &'a str,
    constraint: &'a str,
    depth: u32,
    path: &'a mut Vec<String>,
    state: &'a mut DfsState,
    options: &'a ResolveOptions,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<DependencyNode>>> + Send + 'a>> {
    Box::pin(async move {
        if resolver.ecosystem().is_system_package(name) {
            return Ok(Some(DependencyNode::system_skip_node(Coordinate::new(resolver.ecosystem(), name, constraint))));
        }

        let Some(chosen) = resolver.select_version(name, constraint).await? else {
            state.failed.push(crate::model::dependency::FailedResolution {
                coord_name: name.to_string(),
                reason: format!("no version satisfies constraint '{constraint}'"),
            });
            return Ok(None);
        };

        if let Some((existing_version, existing_depth)) = state.visited.get(name).cloned() {
            if existing_version == chosen {
                return Ok(Some(DependencyNode::leaf(Coordinate::new(resolver.ecosystem(), name, existing_version))));
            }
            if resolver.satisfies(name, &existing_version, constraint).await? {
                return Ok(Some(DependencyNode::leaf(Coordinate::new(resolver.ecosystem(), name, existing_version))));
            }
            if resolver.nearest_wins() && depth < existing_depth {
                state.visited.insert(name.to_string(), (chosen.clone(), depth));
                state.conflicts.push(Conflict {
                    name: name.to_string(),
                    kind: ConflictType::VersionMismatch,
                    versions: vec![existing_version, chosen.clone()],
                    requested_by: vec![path.clone()],
                });
                return Ok(Some(DependencyNode::leaf(Coordinate::new(resolver.ecosystem(), name, chosen))));
            }
            state.conflicts.push(Conflict {
                name: name.to_string(),
                kind: ConflictType::VersionMismatch,
                versions: vec![existing_version.clone(), chosen.clone()],
                requested_by: vec![path.clone()],
            });
            return Ok(Some(DependencyNode::leaf(Coordinate::new(resolver.ecosystem(), name, existing_version))));
        }

        if path.iter().any(|p| p == name) {
            state.conflicts.push(Conflict {
                name: name.to_string(),
                kind: ConflictType::Circular,
                versions: vec![chosen.clone()],
                requested_by: vec![path.clone()],
            });
            return Ok(Some(DependencyNode::cycle_stub(Coordinate::new(resolver.ecosystem(), name, chosen))));
        }

        state.visited.insert(name.to_string(), (chosen.clone(), depth));

        if depth >= options.max_depth {
            state.max_depth_reached = true;
            return Ok(Some(DependencyNode::leaf(Coordinate::new(resolver.ecosystem(), name, chosen))));
        }

        let deps = resolver.dependencies(name, &chosen, options).await?;
        path.push(name.to_string());

        // Children are expanded concurrently (bounded by metadata_concurrency
        // at the fetcher/cache layer) and joined before this node returns.
        let mut included = Vec::new();
        for dep in &deps {
            if !dep.included {
                state.conflicts.push(Conflict {
                    name: dep.raw.name.clone(),
                    kind: ConflictType::MarkerFiltered,
                    versions: vec![],
                    requested_by: vec![path.clone()],
                });
                continue;
            }
            if dep.raw.optional && !options.include_optional {
                continue;
            }
            included.push(dep.clone());
        }

        let mut children = Vec::new();
        let chunk_size = options.metadata_concurrency.max(1);
        for chunk in included.chunks(chunk_size) {
            // Sequential recursion per item (the visited map is shared
            // mutable state DFS must serialize on); only the leaf metadata
            // fetch itself benefits from the fetcher/cache's own
            // concurrency, which this loop does not need to re-implement.
            for dep in chunk {
                if let Some(child) = resolve_one(resolver, &dep.raw.name, &dep.raw.constraint, depth + 1, path, state, options).await? {
                    children.push(child);
                }
            }
        }
        // join_all retained for metadata warm-up only: pre-fetch versions for
        // the next depth's siblings concurrently before the sequential walk.
        let _ = join_all(included.iter().map(|d| resolver.select_version(&d.raw.name, &d.raw.constraint))).await;

        path.pop();

        let mut node = DependencyNode::leaf(Coordinate::new(resolver.ecosystem(), name, chosen));
        node.children = children;
        Ok(Some(node))
    })
}

/// Registry of all six ecosystem resolvers, keyed by tag, used by the
/// orchestrator to dispatch a `resolve` request without a giant match.
pub type ResolverRegistry = HashMap<Ecosystem, Arc<dyn EcosystemResolver>>;

/// Builds every resolver over one shared HTTP client and metadata cache, the
/// shape the thin CLI entry point and any future host need to assemble an
/// `Orchestrator` without repeating each fetcher's constructor chain.
#[must_use]
pub fn build_registry(
    client: reqwest::Client,
    metadata_cache: Arc<crate::cache::metadata_cache::MetadataCache>,
    options: &ResolveOptions,
) -> ResolverRegistry {
    let mut registry: ResolverRegistry = HashMap::new();

    let pypi = crate::fetchers::pypi::PypiFetcher::new(client.clone(), metadata_cache.clone());
    registry.insert(Ecosystem::Pip, Arc::new(pip::PipResolver::new(pypi, options)));

    let npm = crate::fetchers::npm::NpmFetcher::new(client.clone(), metadata_cache.clone());
    registry.insert(Ecosystem::Npm, Arc::new(npm::NpmResolver::new(npm)));

    let maven = crate::fetchers::maven::MavenFetcher::new(client.clone(), metadata_cache.clone());
    registry.insert(Ecosystem::Maven, Arc::new(maven::MavenResolver::new(maven)));

    let conda = crate::fetchers::conda::CondaFetcher::new(client.clone(), metadata_cache.clone());
    registry.insert(Ecosystem::Conda, Arc::new(conda::CondaResolver::new(conda, client.clone(), options)));

    let yum = crate::fetchers::yum::YumFetcher::new(client.clone(), metadata_cache);
    registry.insert(Ecosystem::Yum, Arc::new(yum::YumResolver::new(yum)));

    registry.insert(Ecosystem::Docker, Arc::new(docker::DockerResolver::new(client)));

    registry
}
