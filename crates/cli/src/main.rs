//! Herd CLI
//!
//! Generates synthetic herd data, trains the yield and disease bundles, and
//! runs predictions and record lookups against local files.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{generate, inspect, lookup, predict, train, Paths};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Dairy herd milk yield and disease predictor
#[derive(Parser)]
#[command(name = "herd")]
#[command(author, version, about = "CLI for the Herd yield and disease predictor", long_about = None)]
pub struct Cli {
    /// CSV record table (can also be set via HERD_DATA_PATH env var)
    #[arg(long, env = "HERD_DATA_PATH", global = true)]
    pub data: Option<PathBuf>,

    /// Directory holding the model bundles (can also be set via HERD_MODEL_DIR env var)
    #[arg(long, env = "HERD_MODEL_DIR", global = true)]
    pub model_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a synthetic labeled herd to the record table
    Generate {
        /// Number of records to generate
        #[arg(long, short, default_value_t = herd_lib::generator::DEFAULT_SAMPLES)]
        samples: usize,

        /// Random seed
        #[arg(long, default_value_t = herd_lib::generator::DEFAULT_SEED)]
        seed: u64,

        /// Where to write the table (defaults to --data)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Train both models on the record table and save the bundles
    Train {
        /// Trees per forest
        #[arg(long)]
        trees: Option<usize>,

        /// Seed for the splits and both forests
        #[arg(long)]
        seed: Option<u64>,

        /// Share of rows held out for evaluation
        #[arg(long, default_value_t = herd_lib::training::DEFAULT_TEST_FRACTION)]
        test_fraction: f64,
    },

    /// Predict yield and disease for records in a JSON file
    Predict {
        /// JSON file with one record or an array of records ("-" for stdin)
        #[arg(long, short)]
        input: PathBuf,

        /// Which model to run
        #[arg(long, short, value_enum, default_value_t = predict::Target::Both)]
        target: predict::Target,
    },

    /// Show metadata of the saved bundles
    Inspect,

    /// Show the latest stored record for an animal
    Lookup {
        /// Animal identifier, e.g. CATTLE_1042
        animal_id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load()?;
    let paths = Paths::resolve(cli.data, cli.model_dir, &config);
    let format = cli.format.unwrap_or_else(|| config.format());

    match cli.command {
        Commands::Generate {
            samples,
            seed,
            output,
        } => {
            let paths = match output {
                Some(data) => Paths { data, ..paths },
                None => paths,
            };
            generate::generate(&paths, samples, seed, format)?;
        }
        Commands::Train {
            trees,
            seed,
            test_fraction,
        } => {
            train::train(&paths, trees, seed, test_fraction, format)?;
        }
        Commands::Predict { input, target } => {
            predict::predict(&paths, &input, target, format)?;
        }
        Commands::Inspect => {
            inspect::inspect(&paths, format)?;
        }
        Commands::Lookup { animal_id } => {
            lookup::lookup(&paths, &animal_id, format)?;
        }
    }

    Ok(())
}
