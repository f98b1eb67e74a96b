//! CLI entry point for transformers-lightning-rs.

use std::io::{self, Write};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transformers_lightning_rs::cli;
use transformers_lightning_rs::dataset::RetrievalSet;
use transformers_lightning_rs::{LightningConfig, Result};

#[derive(Parser)]
#[command(name = "transformers-lightning")]
#[command(about = "Learning-rate schedules and retrieval metrics for transformer fine-tuning")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        config: String,
    },
    /// Generate a sample configuration file
    Init {
        /// Output path for config file
        #[arg(default_value = "config.yaml")]
        output: String,
        /// Preset (cosine-restarts, linear-warmup, electra-layerwise)
        #[arg(long, default_value = "cosine-restarts")]
        preset: String,
    },
    /// Print the learning rate schedule step by step
    Schedule {
        /// Path to configuration file
        config: String,
        /// Number of steps to print (default: until the end of training)
        #[arg(long)]
        steps: Option<usize>,
    },
    /// Evaluate retrieval metrics on a JSONL prediction file
    Evaluate {
        /// Path to configuration file
        config: String,
        /// JSONL file with one {"group", "score", "label"} object per line
        #[arg(long)]
        input: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();
    let mut stdout = io::stdout().lock();

    match args.command {
        Commands::Validate { config } => {
            tracing::info!("Validating configuration: {}", config);
            let config = LightningConfig::from_file(&config)?;
            cli::validate(&config, &mut stdout)?;
        }
        Commands::Init { output, preset } => {
            tracing::info!("Generating config for preset: {}", preset);
            let config = LightningConfig::from_preset(&preset)?;
            config.to_file(&output)?;
            writeln!(stdout, "✓ Configuration written to: {output}")?;
        }
        Commands::Schedule { config, steps } => {
            tracing::info!("Tracing schedule from config: {}", config);
            let config = LightningConfig::from_file(&config)?;
            cli::schedule(&config, steps, &mut stdout)?;
        }
        Commands::Evaluate { config, input } => {
            tracing::info!("Evaluating {} with config: {}", input, config);
            let config = LightningConfig::from_file(&config)?;
            config.validate()?;
            let set = RetrievalSet::load(&input)?;
            cli::evaluate(&config, &set, &mut stdout)?;
        }
    }

    Ok(())
}
