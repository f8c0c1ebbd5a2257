//! # Callflow Core
//!
//! Reconstruction engine for voice-session telemetry.
//!
//! A session leaves three overlapping records behind: the structured session
//! log, the command (webhook) log and free-text diagnostic markers. This crate
//! reconciles them into one causally ordered [`Timeline`] of states and the
//! calls made in each, plus a [`FlowGraph`] for diagramming.
//!
//! The pipeline runs one way:
//! 1. [`normalize`]: raw records to candidate transitions and invocations
//! 2. [`dedup`]: repeated invocation records collapse
//! 3. [`correlate`]: invocations meet their command-log responses
//! 4. [`reattribute`]: calls logged under a state they forced are moved back
//! 5. [`timeline`]: ordering, slots and the implicit initial state
//! 6. [`graph`]: node/edge projection
//!
//! Reconstruction never fails. Only loading a bundle and serializing the
//! result return [`FlowResult`].

pub mod config;
pub mod correlate;
pub mod dedup;
pub mod error;
pub mod graph;
pub mod normalize;
pub mod raw;
pub mod reattribute;
pub mod renderer;
pub mod timeline;
pub mod types;

pub use config::ReconstructionConfig;
pub use correlate::{extract_directives, CommandCorrelator, CommandQueues};
pub use dedup::{dedup_invocations, dedup_transitions};
pub use error::{FlowError, FlowResult};
pub use graph::{project, sanitize_id, EdgeKind, FlowEdge, FlowGraph, FlowNode, NodeKind};
pub use normalize::{NormalizedLog, Normalizer, SessionStart, TurnMessage};
pub use raw::{LogBundle, RawCommandEntry, RawLogEntry};
pub use reattribute::ReattributionFilter;
pub use renderer::{render_ascii_tree, render_mermaid, TimelineRenderer};
pub use timeline::{
    StateInvocationCount, Timeline, TimelineAssembler, TimelineSegment, TimelineStats,
};
pub use types::*;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Result of one reconstruction run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    pub timeline: Timeline,
    pub graph: FlowGraph,
}

impl Reconstruction {
    pub fn to_json(&self) -> FlowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> FlowResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Reconstruct the timeline of one session
pub fn reconstruct(bundle: &LogBundle, config: &ReconstructionConfig) -> Timeline {
    let normalized = Normalizer::new(config).normalize(bundle);
    let NormalizedLog {
        transitions,
        invocations,
        turns,
        session_start,
        log_start,
    } = normalized;

    // Duplicate markers must not consume command-log records.
    let invocations = dedup_invocations(invocations, config.bucket_width());

    let correlator = CommandCorrelator::new(config);
    let invocations = correlator.correlate(invocations, &bundle.command_log);
    let invocations = correlator.correlate_turns(invocations, &turns);

    // Reattribution looks at every recorded transition, repeats included.
    let invocations = ReattributionFilter::new(config).apply(invocations, &transitions);
    let transitions = dedup_transitions(transitions);

    let timeline = TimelineAssembler::new(config).assemble(
        transitions,
        invocations,
        session_start.as_ref(),
        log_start,
    );
    info!(
        "Reconstructed session: {} segments over {}µs",
        timeline.segments.len(),
        timeline.stats.span_us
    );
    timeline
}

/// Reconstruct the timeline and project its graph
pub fn reconstruct_with_graph(
    bundle: &LogBundle,
    config: &ReconstructionConfig,
) -> Reconstruction {
    let timeline = reconstruct(bundle, config);
    let graph = project(&timeline);
    Reconstruction { timeline, graph }
}
