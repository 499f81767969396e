//! dining-table - runs a dinner until Ctrl-C or a fixed duration.
//!
//! Configuration comes from an optional JSON file, then command-line flags
//! (or their `DINING_*` environment variables) override it.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use dining_core::dinner::Dinner;
use dining_core::types::Strategy;
use dining_core::Config;

#[derive(Parser, Debug)]
#[command(name = "dining-table", about = "Dining philosophers with a monitor and a footman")]
struct Cli {
    /// JSON configuration file. Flags below override it.
    #[arg(long, env = "DINING_CONFIG")]
    config: Option<PathBuf>,

    /// Number of philosophers (and forks).
    #[arg(long, env = "DINING_SEATS")]
    seats: Option<usize>,

    /// Maximum philosophers past the footman (default: seats - 1).
    #[arg(long, env = "DINING_MAX_SEATED")]
    max_seated: Option<usize>,

    /// Seating implementation.
    #[arg(long, value_enum, env = "DINING_STRATEGY")]
    strategy: Option<Strategy>,

    /// Stop after this long (e.g. "10s") instead of waiting for Ctrl-C.
    #[arg(long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Emit logs and status snapshots as JSON.
    #[arg(long)]
    json: bool,

    /// Do not print the status table.
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    fn into_config(self) -> dining_core::Result<(Config, Option<Duration>)> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };
        if let Some(seats) = self.seats {
            config.table.seats = seats;
        }
        if self.max_seated.is_some() {
            config.table.max_seated = self.max_seated;
        }
        if let Some(strategy) = self.strategy {
            config.table.strategy = strategy;
        }
        if self.json {
            config.observability.json_logs = true;
            config.reporter.json = true;
        }
        if self.quiet {
            config.reporter.enabled = false;
        }
        config.validate()?;
        Ok((config, self.duration))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, duration) = Cli::parse().into_config()?;

    dining_core::observability::init_tracing(&config.observability);

    let dinner = Dinner::start(&config)?;
    let stop = dinner.cancellation_token();

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = tokio::signal::ctrl_c() => {}
                _ = stop.cancelled() => {}
            }
        }
        None => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = stop.cancelled() => {}
            }
        }
    }

    let stats = dinner.shutdown().await?;
    for s in &stats {
        tracing::info!(
            philosopher = s.id,
            meals = s.meals,
            hungry = ?s.hungry_time,
            eating = ?s.eating_time,
            "philosopher_summary"
        );
    }
    Ok(())
}
