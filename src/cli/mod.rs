//! Thin CLI entry point (spec 6a): a `clap`-derive binary with two
//! illustrative subcommands, `resolve` and `fetch`, that build a
//! `ResolveOptions`/job from flags and print the resulting events as
//! line-delimited JSON to stdout. Flag surface and help text are not
//! governed by the design this crate implements; kept deliberately small.

pub mod fetch;
pub mod resolve;

use clap::{Parser, Subcommand};

use crate::error::Result;

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Resolve and pre-fetch package artifacts for air-gapped bundling")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a set of root packages into a dependency tree, without downloading.
    Resolve(resolve::ResolveArgs),
    /// Resolve and download artifacts for a set of root packages.
    Fetch(fetch::FetchArgs),
}

pub struct CliDispatcher;

impl CliDispatcher {
    pub async fn execute(command: Commands) -> Result<()> {
        match command {
            Commands::Resolve(args) => resolve::run(args).await,
            Commands::Fetch(args) => fetch::run(args).await,
        }
    }
}

/// Parses `ecosystem:name@constraint` (constraint may be empty, e.g. `npm:lodash@`
/// for "any version") into the triple `resolve`/`fetch` roots are built from.
pub(crate) fn parse_root(spec: &str) -> Result<(crate::coordinate::Ecosystem, String, String)> {
    let (ecosystem_str, rest) = spec.split_once(':').ok_or_else(|| crate::error::DepotError::ParseError {
        context: "root package spec".to_string(),
        message: format!("expected 'ecosystem:name@constraint', got '{spec}'"),
    })?;
    let ecosystem: crate::coordinate::Ecosystem = ecosystem_str.parse()?;
    let (name, constraint) = rest.split_once('@').unwrap_or((rest, ""));
    Ok((ecosystem, name.to_string(), constraint.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Ecosystem;

    #[test]
    fn parse_root_splits_ecosystem_name_and_constraint() {
        let (eco, name, constraint) = parse_root("pip:flask@==2.0.0").unwrap();
        assert_eq!(eco, Ecosystem::Pip);
        assert_eq!(name, "flask");
        assert_eq!(constraint, "==2.0.0");
    }

    #[test]
    fn parse_root_allows_empty_constraint() {
        let (_, name, constraint) = parse_root("npm:lodash@").unwrap();
        assert_eq!(name, "lodash");
        assert_eq!(constraint, "");
    }

    #[test]
    fn parse_root_rejects_missing_ecosystem() {
        assert!(parse_root("flask==2.0.0").is_err());
    }
}
