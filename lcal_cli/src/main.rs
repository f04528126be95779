//! This binary writes Brent Council's waste collection dates and the London Natural History
//! Society's programme to iCalendar files.
//!
//! It is meant to be run periodically, e.g. from cron, and exits early while the output is fresh.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::{run, Arguments};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    debug!(?args, "parsed arguments");
    run(args.command).await
}
