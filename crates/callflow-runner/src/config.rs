//! Environment variable configuration for the runner
//!
//! Every reconstruction heuristic can be overridden from the environment (or
//! a `.env` file). Unset or unparseable values fall back to the core defaults.

use callflow_core::config::{
    DEFAULT_DEDUP_BUCKET_US, DEFAULT_DIAGNOSTIC_ROLE, DEFAULT_IMPLICIT_STATE_NAME,
    DEFAULT_REATTRIBUTION_WINDOW_US, DEFAULT_SUBMISSION_COMMAND, DEFAULT_TURN_MATCH_TOLERANCE_US,
};
use callflow_core::ReconstructionConfig;
use std::env;
use std::str::FromStr;
use tracing::debug;

pub const REATTRIBUTION_WINDOW_MS: &str = "CALLFLOW_REATTRIBUTION_WINDOW_MS";
pub const TURN_TOLERANCE_MS: &str = "CALLFLOW_TURN_TOLERANCE_MS";
pub const DEDUP_BUCKET_US: &str = "CALLFLOW_DEDUP_BUCKET_US";
pub const DIAGNOSTIC_ROLE: &str = "CALLFLOW_DIAGNOSTIC_ROLE";
pub const SUBMISSION_COMMAND: &str = "CALLFLOW_SUBMISSION_COMMAND";
pub const IMPLICIT_STATE: &str = "CALLFLOW_IMPLICIT_STATE";

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| T::from_str(s.trim()).ok())
}

fn string_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reattribution window in microseconds
pub fn reattribution_window_us() -> u64 {
    parse_var::<u64>(REATTRIBUTION_WINDOW_MS)
        .map(|ms| ms.saturating_mul(1_000))
        .unwrap_or(DEFAULT_REATTRIBUTION_WINDOW_US)
}

/// Turn-latency match tolerance in microseconds
pub fn turn_match_tolerance_us() -> u64 {
    parse_var::<u64>(TURN_TOLERANCE_MS)
        .map(|ms| ms.saturating_mul(1_000))
        .unwrap_or(DEFAULT_TURN_MATCH_TOLERANCE_US)
}

pub fn dedup_bucket_us() -> u64 {
    parse_var(DEDUP_BUCKET_US).unwrap_or(DEFAULT_DEDUP_BUCKET_US)
}

pub fn diagnostic_role() -> String {
    string_var(DIAGNOSTIC_ROLE).unwrap_or_else(|| DEFAULT_DIAGNOSTIC_ROLE.to_string())
}

pub fn submission_command() -> String {
    string_var(SUBMISSION_COMMAND).unwrap_or_else(|| DEFAULT_SUBMISSION_COMMAND.to_string())
}

pub fn implicit_state_name() -> String {
    string_var(IMPLICIT_STATE).unwrap_or_else(|| DEFAULT_IMPLICIT_STATE_NAME.to_string())
}

/// Build the reconstruction config from the environment
pub fn reconstruction_config() -> ReconstructionConfig {
    let config = ReconstructionConfig::default()
        .with_reattribution_window_us(reattribution_window_us())
        .with_turn_match_tolerance_us(turn_match_tolerance_us())
        .with_dedup_bucket_us(dedup_bucket_us())
        .with_diagnostic_role(diagnostic_role())
        .with_submission_command(submission_command())
        .with_implicit_state_name(implicit_state_name());
    debug!("Reconstruction config: {:?}", config);
    config
}
