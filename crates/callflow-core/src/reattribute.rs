//! Causal reattribution
//!
//! When a command response navigates the conversation, the session log can
//! observe the state change before it finishes writing the call itself. The
//! call then shows up attributed to the destination state even though it ran
//! in the origin. This pass moves such calls back.

use crate::config::ReconstructionConfig;
use crate::types::{Invocation, StateTransition, TriggerKind};
use tracing::debug;

pub struct ReattributionFilter<'a> {
    config: &'a ReconstructionConfig,
}

impl<'a> ReattributionFilter<'a> {
    pub fn new(config: &'a ReconstructionConfig) -> Self {
        Self { config }
    }

    /// Apply the correction once. `transitions` must be sorted by timestamp.
    pub fn apply(
        &self,
        invocations: Vec<Invocation>,
        transitions: &[StateTransition],
    ) -> Vec<Invocation> {
        invocations
            .into_iter()
            .map(|invocation| self.reattribute(invocation, transitions))
            .collect()
    }

    fn reattribute(
        &self,
        mut invocation: Invocation,
        transitions: &[StateTransition],
    ) -> Invocation {
        if !invocation.forced {
            return invocation;
        }
        let Some(state) = invocation.state.as_deref() else {
            return invocation;
        };

        let window = self.config.reattribution_window_us;
        // Latest qualifying transition that actually left another state
        let racing = transitions
            .iter()
            .rev()
            .filter(|t| t.trigger == TriggerKind::WebhookForced && t.target == state)
            .filter(|t| t.timestamp <= invocation.timestamp)
            .filter(|t| invocation.timestamp - t.timestamp <= window)
            .find_map(|t| t.origin.as_deref().filter(|origin| *origin != state));

        let Some(origin) = racing.map(str::to_string) else {
            return invocation;
        };

        debug!(
            "Reattributing {} at {} from {} to {}",
            invocation.name, invocation.timestamp, state, origin
        );
        invocation.reattributed_from = invocation.state.replace(origin);
        invocation
    }
}
