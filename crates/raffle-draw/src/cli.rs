//! Command-line surface.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use crate::config::DrawConfig;
use crate::run::{execute_draw, simulate, DrawOptions};

/// Weighted cascading raffle: four award stages drawn from one ticket table.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML config file (defaults to ./raffle-draw.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Draw winners from the tickets table and persist them
    Draw {
        /// Seed for the generator (overrides RAFFLE_SEED and the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Draw and log winners without inserting them
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Draw even if the winners table already has rows
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Run the cascade against a JSON weights file and print the result
    Simulate {
        /// JSON array of {participant_id, weight} rows
        #[arg(long)]
        weights: PathBuf,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the effective draw plan
    Plan {
        #[arg(long, value_enum, default_value_t = PlanFormat::Toml)]
        format: PlanFormat,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Toml,
    Json,
}

impl Cli {
    /// Load configuration and execute the chosen subcommand. Configuration
    /// failures are returned like any other so the caller logs them once.
    pub async fn run(self) -> Result<()> {
        let config = DrawConfig::load(self.config.as_deref())?;

        match self.command {
            Command::Draw {
                seed,
                dry_run,
                force,
            } => {
                let options = DrawOptions {
                    seed,
                    dry_run,
                    force,
                };
                let summary = execute_draw(&config, options).await?;
                info!(
                    run_id = %summary.header.run_id,
                    seed = summary.header.seed,
                    "replay with --seed {}",
                    summary.header.seed
                );
                print_json(&summary)
            }
            Command::Simulate { weights, seed } => {
                let (summary, _) = simulate(&config, &weights, seed).await?;
                print_json(&summary)
            }
            Command::Plan { format } => {
                println!("{}", render_plan(&config, format)?);
                Ok(())
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}

fn render_plan(config: &DrawConfig, format: PlanFormat) -> Result<String> {
    match format {
        PlanFormat::Json => {
            serde_json::to_string_pretty(&config.plan).context("Failed to render plan")
        }
        PlanFormat::Toml => toml::to_string_pretty(&config.plan).context("Failed to render plan"),
    }
}
