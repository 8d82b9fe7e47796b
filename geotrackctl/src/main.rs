use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geotrackctl::{CtlConfig, Scenario, replay};

#[derive(Parser)]
#[command(name = "geotrackctl", about = "Geotrack scenario replay and config inspection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a scenario file against an in-memory index, printing events as JSON lines
    Replay {
        /// Scenario JSON file
        scenario: PathBuf,
        /// How long to keep collecting events after the last step
        #[arg(long, default_value_t = 0)]
        drain_ms: u64,
    },
    /// Print the effective configuration and where it came from
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries replay output; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let (config, source) = CtlConfig::load_from_env()?;
    tracing::debug!(%source, "configuration resolved");

    match cli.command {
        Command::Replay { scenario, drain_ms } => {
            let scenario = Scenario::load(&scenario)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let summary =
                replay::run(scenario, &config, Duration::from_millis(drain_ms), &mut out).await?;
            out.flush()?;
            tracing::info!(
                steps = summary.steps,
                events = summary.events,
                failures = summary.failures,
                "replay finished"
            );
        }
        Command::Config => {
            println!("# source: {source}");
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
