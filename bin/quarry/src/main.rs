//! The quarry indexer binary.

#![warn(missing_debug_implementations, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

use anyhow::Result;
use clap::Parser;

mod app;
mod cli;
mod config;
mod metrics;
mod telemetry;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::run(cli).await
}
