//! This module implements the command line of `lcal`.
//!
//! Every option can also be given through the environment variable named next to it.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lcal_core::{
    cache_gate::CacheGate,
    event_client::{self, EventConfig},
    pipeline::{generate, Outcome},
    response_cache::ResponseCache,
    source_client::SourceClient,
    waste_client::{self, WasteConfig},
};
use tracing::info;

const SECONDS_PER_HOUR: u64 = 60 * 60;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Arguments {
    /// log debug output, RUST_LOG takes precedence
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write Brent Council's upcoming bin collections to a calendar
    Waste {
        #[command(flatten)]
        args: WasteArgs,
    },
    /// Write the London Natural History Society's programme to a calendar
    Events {
        #[command(flatten)]
        args: EventArgs,
    },
}

/// When an existing output file is regenerated.
#[derive(Debug, Args)]
pub struct GateArgs {
    /// regenerate the calendar even if the output file exists
    #[arg(long)]
    pub no_cache: bool,
    /// regenerate the calendar if the output file is older than this many hours
    #[arg(long, value_name = "HOURS")]
    pub max_age_hours: Option<u64>,
}

impl From<&GateArgs> for CacheGate {
    fn from(value: &GateArgs) -> Self {
        CacheGate {
            force: value.no_cache,
            max_age: value
                .max_age_hours
                .map(|hours| Duration::from_secs(hours.saturating_mul(SECONDS_PER_HOUR))),
        }
    }
}

#[derive(Debug, Args)]
pub struct WasteArgs {
    /// the property id as it appears in the bin days URL
    #[arg(env = "BRENT_PROPERTY_ID")]
    pub property_id: String,
    /// the calendar file to write
    #[arg(
        short,
        long,
        env = "WASTE_CALENDAR_FILENAME",
        default_value = "calendar.ics"
    )]
    pub output: PathBuf,
    #[command(flatten)]
    pub gate: GateArgs,
    /// how often to ask for the bin days while they are still loading
    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,
    /// seconds to wait before asking again
    #[arg(long, default_value_t = 3)]
    pub poll_delay_secs: u64,
}

impl From<&WasteArgs> for WasteConfig {
    fn from(value: &WasteArgs) -> Self {
        WasteConfig {
            max_attempts: value.max_attempts.max(1),
            poll_delay: Duration::from_secs(value.poll_delay_secs),
            ..WasteConfig::new(value.property_id.trim())
        }
    }
}

#[derive(Debug, Args)]
pub struct EventArgs {
    /// the year of the first month, the current year if omitted
    #[arg(long)]
    pub year: Option<i32>,
    /// how many months to include, starting with the current month
    #[arg(long, default_value_t = 2)]
    pub months: u32,
    /// the calendar file to write
    #[arg(
        short,
        long,
        env = "LNHS_CALENDAR_FILENAME",
        default_value = "lnhs_events.ics"
    )]
    pub output: PathBuf,
    /// the directory for downloaded pages
    #[arg(long, default_value = "cache")]
    pub cache_dir: PathBuf,
    #[command(flatten)]
    pub gate: GateArgs,
    /// milliseconds to wait between two event downloads
    #[arg(long, default_value_t = 500)]
    pub request_delay_ms: u64,
}

impl From<&EventArgs> for EventConfig {
    fn from(value: &EventArgs) -> Self {
        EventConfig {
            year: value.year,
            months: value.months,
            request_delay: Duration::from_millis(value.request_delay_ms),
            ..EventConfig::default()
        }
    }
}

pub async fn run(command: Command) -> Result<()> {
    let outcome = match command {
        Command::Waste { args } => run_waste(args).await?,
        Command::Events { args } => run_events(args).await?,
    };
    if outcome == Outcome::Skipped {
        info!("nothing to do");
    }
    Ok(())
}

async fn run_waste(args: WasteArgs) -> Result<Outcome> {
    let config = WasteConfig::from(&args);
    let client = SourceClient::new()?;
    let today = chrono::Local::now().date_naive();
    generate(&CacheGate::from(&args.gate), &args.output, || {
        waste_client::get(&client, &config, today)
    })
    .await
    .with_context(|| format!("could not write waste calendar {}", args.output.display()))
}

async fn run_events(args: EventArgs) -> Result<Outcome> {
    let config = EventConfig::from(&args);
    let client = SourceClient::new()?;
    // a forced run also refreshes the downloaded pages
    let cache = ResponseCache::new(&args.cache_dir, args.gate.no_cache).with_context(|| {
        format!("could not create cache directory {}", args.cache_dir.display())
    })?;
    let today = chrono::Local::now().date_naive();
    generate(&CacheGate::from(&args.gate), &args.output, || {
        event_client::get(&client, &cache, &config, today)
    })
    .await
    .with_context(|| format!("could not write event calendar {}", args.output.display()))
}
