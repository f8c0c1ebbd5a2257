//! Deduplication
//!
//! The same logical event is often written more than once: a structured
//! entry plus a free-text marker, or a retried log write.

use crate::types::{Invocation, StateTransition};
use std::collections::BTreeSet;
use tracing::debug;

/// Keep the first of every group of same-name invocations that fall into the
/// same `bucket_us`-wide time bucket. Order of first appearance is kept.
pub fn dedup_invocations(invocations: Vec<Invocation>, bucket_us: u64) -> Vec<Invocation> {
    let bucket_us = bucket_us.max(1);
    let before = invocations.len();
    let mut seen: BTreeSet<(String, u64)> = BTreeSet::new();

    let kept: Vec<Invocation> = invocations
        .into_iter()
        .filter(|i| seen.insert((i.name.clone(), i.timestamp / bucket_us)))
        .collect();

    if kept.len() != before {
        debug!("Dropped {} duplicate invocations", before - kept.len());
    }
    kept
}

/// Collapse runs of consecutive transitions into the same target, whatever
/// their trigger, into the first of the run.
pub fn dedup_transitions(transitions: Vec<StateTransition>) -> Vec<StateTransition> {
    let before = transitions.len();
    let mut kept: Vec<StateTransition> = Vec::with_capacity(before);

    for transition in transitions {
        if kept.last().is_some_and(|last| last.target == transition.target) {
            continue;
        }
        kept.push(transition);
    }

    if kept.len() != before {
        debug!("Collapsed {} repeated transitions", before - kept.len());
    }
    kept
}
