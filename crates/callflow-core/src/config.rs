//! Reconstruction heuristics
//!
//! The time windows below encode assumptions about clock skew between the
//! session log and the command log. They are named here and carried on
//! [`ReconstructionConfig`] so a deployment can tune them without touching
//! the pipeline.

use serde::{Deserialize, Serialize};

/// Maximum delay (µs) between a webhook-forced transition and a forced
/// invocation logged under its destination for the invocation to be moved
/// back to the origin state. Inclusive.
pub const DEFAULT_REATTRIBUTION_WINDOW_US: u64 = 100_000;

/// Maximum distance (µs) between a tool turn message and an invocation for
/// their latencies to be joined.
pub const DEFAULT_TURN_MATCH_TOLERANCE_US: u64 = 5_000_000;

/// Width (µs) of the bucket inside which two same-name invocations are the
/// same logical event.
pub const DEFAULT_DEDUP_BUCKET_US: u64 = 1_000;

/// Role tag of session-log entries written by the platform itself.
pub const DEFAULT_DIAGNOSTIC_ROLE: &str = "system-log";

/// Command name under which form answers are submitted.
pub const DEFAULT_SUBMISSION_COMMAND: &str = "gather_submit";

/// Display name of a synthesized initial state when the session-start
/// marker does not name one.
pub const DEFAULT_IMPLICIT_STATE_NAME: &str = "implicit_start";

/// Tunable parameters for a single reconstruction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    pub reattribution_window_us: u64,
    pub turn_match_tolerance_us: u64,
    pub dedup_bucket_us: u64,
    pub diagnostic_role: String,
    pub submission_command: String,
    pub implicit_state_name: String,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            reattribution_window_us: DEFAULT_REATTRIBUTION_WINDOW_US,
            turn_match_tolerance_us: DEFAULT_TURN_MATCH_TOLERANCE_US,
            dedup_bucket_us: DEFAULT_DEDUP_BUCKET_US,
            diagnostic_role: DEFAULT_DIAGNOSTIC_ROLE.to_string(),
            submission_command: DEFAULT_SUBMISSION_COMMAND.to_string(),
            implicit_state_name: DEFAULT_IMPLICIT_STATE_NAME.to_string(),
        }
    }
}

impl ReconstructionConfig {
    pub fn with_reattribution_window_us(mut self, window_us: u64) -> Self {
        self.reattribution_window_us = window_us;
        self
    }

    pub fn with_turn_match_tolerance_us(mut self, tolerance_us: u64) -> Self {
        self.turn_match_tolerance_us = tolerance_us;
        self
    }

    /// A zero bucket is clamped to 1µs so bucketing never divides by zero.
    pub fn with_dedup_bucket_us(mut self, bucket_us: u64) -> Self {
        self.dedup_bucket_us = bucket_us.max(1);
        self
    }

    pub fn with_diagnostic_role(mut self, role: impl Into<String>) -> Self {
        self.diagnostic_role = role.into();
        self
    }

    pub fn with_submission_command(mut self, command: impl Into<String>) -> Self {
        self.submission_command = command.into();
        self
    }

    pub fn with_implicit_state_name(mut self, name: impl Into<String>) -> Self {
        self.implicit_state_name = name.into();
        self
    }

    pub(crate) fn bucket_width(&self) -> u64 {
        self.dedup_bucket_us.max(1)
    }
}
