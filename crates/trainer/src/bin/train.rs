use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tastebud_domain::AppConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Train the listening-taste classifier from a YAML configuration"
)]
struct Args {
    /// Path to the configuration file
    #[arg(default_value = "config.yml")]
    config: PathBuf,

    /// Override the configured random seed
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_yaml(&args.config)
        .with_context(|| format!("loading configuration {:?}", args.config))?;
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }

    let summary = tastebud_trainer::run(&config)?;
    println!(
        "Trained on {} rows ({} dropped); artifacts in {}",
        summary.rows,
        summary.skipped.len(),
        config.model_path.display()
    );
    Ok(())
}
