//! Vehicle load AutoML - training entry point
//!
//! Reads the dataset from the current directory and writes all artifacts there.

use clap::Parser;
use tracing::error;
use vehicle_load_automl::{Pipeline, PipelineConfig};

/// Train and select a vehicle overload classifier
#[derive(Parser, Debug)]
#[command(name = "vehicle-load-train")]
#[command(author, version, about, long_about = None)]
struct Cli {}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vehicle_load=info".into()),
        )
        .init();

    let _cli = Cli::parse();

    let pipeline = Pipeline::new(PipelineConfig::default());
    if let Err(e) = pipeline.run() {
        error!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}
