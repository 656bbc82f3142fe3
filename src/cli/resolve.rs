//! `depot resolve`: runs resolution only, prints each ecosystem's
//! `ResolutionResult` (and the job-wide `deps-resolved` event shape) as
//! line-delimited JSON.

use std::sync::Arc;

use clap::Args;

use crate::coordinate::Ecosystem;
use crate::error::Result;
use crate::fetchers::http_client::build_client;
use crate::options::ResolveOptions;
use crate::resolvers;

#[derive(Args)]
pub struct ResolveArgs {
    /// Root package(s) as `ecosystem:name@constraint`, e.g. `pip:flask@==2.0.0`.
    #[arg(long = "package", required = true)]
    pub packages: Vec<String>,
    #[arg(long)]
    pub target_os: Option<String>,
    #[arg(long)]
    pub architecture: Option<String>,
    #[arg(long)]
    pub python_version: Option<String>,
    #[arg(long)]
    pub max_depth: Option<u32>,
    #[arg(long)]
    pub include_optional: bool,
    #[arg(long)]
    pub include_recommends: bool,
    #[arg(long)]
    pub strict_markers: bool,
}

pub async fn run(args: ResolveArgs) -> Result<()> {
    let mut roots = Vec::new();
    for spec in &args.packages {
        roots.push(super::parse_root(spec)?);
    }

    let mut options = ResolveOptions {
        target_os: args.target_os,
        architecture: args.architecture,
        python_version: args.python_version,
        include_optional: args.include_optional,
        include_recommends: args.include_recommends,
        strict_markers: args.strict_markers,
        ..ResolveOptions::default()
    };
    if let Some(max_depth) = args.max_depth {
        options.max_depth = max_depth;
    }

    let client = build_client(32);
    let metadata_cache = Arc::new(crate::cache::metadata_cache::MetadataCache::new(None, 512));
    let registry = resolvers::build_registry(client, metadata_cache, &options);

    let mut by_ecosystem: std::collections::HashMap<Ecosystem, Vec<(String, String)>> = std::collections::HashMap::new();
    for (ecosystem, name, constraint) in roots {
        by_ecosystem.entry(ecosystem).or_default().push((name, constraint));
    }

    for (ecosystem, ecosystem_roots) in by_ecosystem {
        let Some(resolver) = registry.get(&ecosystem) else { continue };
        let result = resolvers::resolve(resolver.as_ref(), &ecosystem_roots, &options).await?;
        println!("{}", serde_json::to_string(&result)?);
    }

    Ok(())
}
