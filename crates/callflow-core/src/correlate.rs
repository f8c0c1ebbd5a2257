//! Command/response correlation
//!
//! Each command name gets its own FIFO queue of command-log records ordered
//! by issue time. Invocations of that name consume the queue in their own
//! order. Matching is by position, never by nearest timestamp, because the
//! same command is often issued several times within a few milliseconds.

use crate::config::ReconstructionConfig;
use crate::normalize::{command_key, TurnMessage};
use crate::raw::RawCommandEntry;
use crate::types::{Directive, DirectiveVerb, Invocation, InvocationKind};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Per-run FIFO cursors over the command log, keyed by command name
#[derive(Debug, Default)]
pub struct CommandQueues<'a> {
    queues: BTreeMap<&'a str, VecDeque<&'a RawCommandEntry>>,
}

impl<'a> CommandQueues<'a> {
    pub fn new(command_log: &'a [RawCommandEntry]) -> Self {
        let mut ordered: Vec<&RawCommandEntry> = command_log.iter().collect();
        ordered.sort_by_key(|e| e.issued_at_us);

        let mut queues: BTreeMap<&str, VecDeque<&RawCommandEntry>> = BTreeMap::new();
        for entry in ordered {
            queues.entry(command_key(entry)).or_default().push_back(entry);
        }
        Self { queues }
    }

    /// Take the oldest unconsumed record for `name`
    pub fn next(&mut self, name: &str) -> Option<&'a RawCommandEntry> {
        self.queues.get_mut(name).and_then(VecDeque::pop_front)
    }

    /// Records nothing claimed
    pub fn remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

pub struct CommandCorrelator<'a> {
    config: &'a ReconstructionConfig,
}

impl<'a> CommandCorrelator<'a> {
    pub fn new(config: &'a ReconstructionConfig) -> Self {
        Self { config }
    }

    /// Attach each invocation to its command-log record.
    ///
    /// `invocations` must already be in timeline order; the output keeps it.
    pub fn correlate(
        &self,
        invocations: Vec<Invocation>,
        command_log: &[RawCommandEntry],
    ) -> Vec<Invocation> {
        let mut queues = CommandQueues::new(command_log);
        let mut unmatched = 0usize;

        let correlated: Vec<Invocation> = invocations
            .into_iter()
            .map(|invocation| match queues.next(&invocation.name) {
                Some(entry) => apply_response(invocation, entry),
                None => {
                    unmatched += 1;
                    debug!(
                        "No command-log record left for {} at {}",
                        invocation.name, invocation.timestamp
                    );
                    invocation
                }
            })
            .collect();

        debug!(
            "Correlated {} invocations ({} without a response, {} records unclaimed)",
            correlated.len(),
            unmatched,
            queues.remaining()
        );
        correlated
    }

    /// Join tool turn latencies onto invocations by timestamp proximity.
    ///
    /// The two logs run on different clocks here, so an exact match would
    /// almost never hit. Each turn takes the nearest unclaimed invocation
    /// within the tolerance, preferring one with the same function name.
    pub fn correlate_turns(
        &self,
        mut invocations: Vec<Invocation>,
        turns: &[TurnMessage],
    ) -> Vec<Invocation> {
        let tolerance = self.config.turn_match_tolerance_us;
        let mut claimed = vec![false; invocations.len()];

        for turn in turns {
            let within = |i: usize| {
                !claimed[i] && invocations[i].timestamp.abs_diff(turn.timestamp) <= tolerance
            };
            let nearest = |same_name: bool| {
                (0..invocations.len())
                    .filter(|&i| within(i))
                    .filter(|&i| {
                        !same_name || turn.name.as_deref() == Some(invocations[i].name.as_str())
                    })
                    .min_by_key(|&i| invocations[i].timestamp.abs_diff(turn.timestamp))
            };

            let pick = if turn.name.is_some() {
                nearest(true).or_else(|| nearest(false))
            } else {
                nearest(false)
            };

            if let Some(i) = pick {
                claimed[i] = true;
                invocations[i].latency_ms = Some(turn.latency_ms);
            }
        }
        invocations
    }
}

fn apply_response(mut invocation: Invocation, entry: &RawCommandEntry) -> Invocation {
    if invocation.request.is_none() {
        invocation.request = entry.request.clone();
    }
    if invocation.kind == InvocationKind::Answer {
        invocation.submitted_value = entry.request.as_ref().map(submitted_answer);
    }
    invocation.response = entry.response.clone();
    invocation.directives = entry
        .response
        .as_ref()
        .map(extract_directives)
        .unwrap_or_default();
    invocation.forced = invocation.directives.iter().any(Directive::is_navigation);
    invocation
}

fn submitted_answer(request: &Value) -> Value {
    request
        .get("answer")
        .or_else(|| request.get("argument").and_then(|a| a.get("answer")))
        .cloned()
        .unwrap_or_else(|| request.clone())
}

/// Pull the directives out of a response payload's `action` list.
///
/// Every key of every action object is one directive. An `action` that is a
/// single object instead of a list is accepted too.
pub fn extract_directives(response: &Value) -> Vec<Directive> {
    let actions = match response.get("action") {
        Some(Value::Array(items)) => items.as_slice(),
        Some(single @ Value::Object(_)) => std::slice::from_ref(single),
        _ => return Vec::new(),
    };

    actions
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|action| {
            action
                .iter()
                .map(|(verb, value)| Directive::new(DirectiveVerb::parse(verb), value.clone()))
        })
        .collect()
}
