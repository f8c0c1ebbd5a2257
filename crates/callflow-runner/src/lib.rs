use anyhow::{Context, Result};
use callflow_core::{reconstruct_with_graph, LogBundle, ReconstructionConfig};
use std::path::Path;
use tracing::{info, instrument};

pub mod config;
pub mod renderer;

pub use renderer::OutputFormat;

/// Load a bundle from disk
pub fn load_bundle(path: &Path) -> Result<LogBundle> {
    LogBundle::from_path(path)
        .with_context(|| format!("Failed to load log bundle: {}", path.display()))
}

/// Load, reconstruct and render one bundle
#[instrument(skip(config))]
pub fn run(
    path: &Path,
    format: OutputFormat,
    include_graph: bool,
    config: &ReconstructionConfig,
) -> Result<String> {
    let bundle = load_bundle(path)?;
    info!(
        "Loaded {} session entries and {} command entries",
        bundle.session_log.len(),
        bundle.command_log.len()
    );

    let result = reconstruct_with_graph(&bundle, config);
    renderer::render(&result, format, include_graph)
}
