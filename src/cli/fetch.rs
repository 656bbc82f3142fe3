//! `depot fetch`: resolves and downloads, printing every emitted `Event` as
//! line-delimited JSON to stdout while the job runs.

use std::sync::Arc;

use clap::Args;
use futures_util::StreamExt;

use crate::cache::artifact_cache::ArtifactCache;
use crate::error::Result;
use crate::events::event_channel;
use crate::fetchers::http_client::build_client;
use crate::options::{CacheOptions, DownloadJobOptions, ResolveOptions};
use crate::orchestrator::{JobRequest, Orchestrator};
use crate::resolvers;

#[derive(Args)]
pub struct FetchArgs {
    /// Root package(s) as `ecosystem:name@constraint`, e.g. `npm:left-pad@^1.3.0`.
    #[arg(long = "package", required = true)]
    pub packages: Vec<String>,
    #[arg(long, default_value = "./depot-cache")]
    pub output_dir: String,
    #[arg(long)]
    pub concurrency: Option<usize>,
    #[arg(long)]
    pub max_depth: Option<u32>,
    #[arg(long)]
    pub include_optional: bool,
    #[arg(long)]
    pub include_recommends: bool,
    #[arg(long)]
    pub python_version: Option<String>,
    #[arg(long)]
    pub no_verify_checksums: bool,
}

pub async fn run(args: FetchArgs) -> Result<()> {
    let mut roots = Vec::new();
    for spec in &args.packages {
        roots.push(super::parse_root(spec)?);
    }

    let resolve_options = ResolveOptions {
        python_version: args.python_version,
        include_optional: args.include_optional,
        include_recommends: args.include_recommends,
        max_depth: args.max_depth.unwrap_or(10),
        ..ResolveOptions::default()
    };
    let mut download_options = DownloadJobOptions { verify_checksums: !args.no_verify_checksums, ..DownloadJobOptions::default() };
    if let Some(concurrency) = args.concurrency {
        download_options.concurrency = concurrency;
    }

    let client = build_client(32);
    let metadata_cache = Arc::new(crate::cache::metadata_cache::MetadataCache::new(None, 512));
    let registry = resolvers::build_registry(client.clone(), metadata_cache, &resolve_options);

    let cache = Arc::new(
        ArtifactCache::open(CacheOptions {
            cache_root: std::path::PathBuf::from(&args.output_dir),
            ..CacheOptions::default()
        })
        .await?,
    );

    let (events_tx, mut events_rx) = event_channel(256);
    let orchestrator = Arc::new(Orchestrator::new(registry, cache, client, events_tx));

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.next().await {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
            if matches!(event, crate::events::Event::Complete { .. }) {
                break;
            }
        }
    });

    let request = JobRequest { roots, resolve_options, download_options };

    let success = orchestrator.start(request, args.output_dir.clone()).await?;
    let _ = printer.await;

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
