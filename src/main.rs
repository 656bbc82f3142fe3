use std::process;

use clap::Parser;
use depot::cli::{Cli, CliDispatcher};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(err) = CliDispatcher::execute(cli.command).await {
        tracing::error!(error = %err, "depot failed");
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
