use anyhow::{Context, Result};
use callflow_runner::{config, run, OutputFormat};
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing::subscriber;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Reconstructs the state timeline of a voice session from its log bundle.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON log bundle of one session.
    bundle: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Tree)]
    format: OutputFormat,

    /// Include the projected node/edge graph.
    #[arg(long)]
    graph: bool,
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,callflow_core=debug"));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    subscriber::set_global_default(subscriber)
        .context("Failed to set global default tracing subscriber")
}

fn main() -> Result<()> {
    // Load environment variables from a .env file in the current directory.
    dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = config::reconstruction_config();
    let output = run(&cli.bundle, cli.format, cli.graph, &config)?;
    println!("{output}");
    Ok(())
}
