//! Binary entrypoint for the retrieval operator CLI.
//! Run with: cargo run -- search "raptor engines"

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use halldyll_retrieval::cli::{Cli, execute};
use halldyll_retrieval::knowledge::KnowledgeEngine;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();
    let config = cli.resolve_config().context("loading configuration")?;
    let engine = KnowledgeEngine::from_config(&config)
        .await
        .context("initializing knowledge engine")?;
    let output = execute(&engine, &cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output.json)?);
    Ok(output.success)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
