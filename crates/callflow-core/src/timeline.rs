//! Timeline assembly
//!
//! Merges the cleaned transition and invocation lists into one ordered
//! sequence. Every invocation ends up owned by exactly one transition (its
//! slot); a synthetic initial state is created when activity predates the
//! first recorded transition.

use crate::config::ReconstructionConfig;
use crate::normalize::SessionStart;
use crate::types::{Invocation, Provenance, StateTransition, TriggerKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One entry of the ordered timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineSegment {
    Transition {
        /// Position of this transition among all transitions
        slot: usize,
        transition: StateTransition,
    },
    Invocation {
        /// Slot of the transition that owns this invocation
        slot: usize,
        invocation: Invocation,
    },
}

impl TimelineSegment {
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Transition { transition, .. } => transition.timestamp,
            Self::Invocation { invocation, .. } => invocation.timestamp,
        }
    }

    pub fn slot(&self) -> usize {
        match self {
            Self::Transition { slot, .. } | Self::Invocation { slot, .. } => *slot,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Transition { .. } => 0,
            Self::Invocation { .. } => 1,
        }
    }
}

/// Invocations owned by one state, summed over every visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInvocationCount {
    pub state: String,
    pub invocations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineStats {
    /// Distinct recorded states; the synthetic initial state is not counted
    pub unique_states: usize,
    /// Recorded transitions; the synthetic initial state is not counted
    pub transition_count: usize,
    pub agent_initiated: usize,
    pub total_invocations: usize,
    /// Microseconds between the first and last segment
    pub span_us: u64,
    /// In first-appearance order, synthetic state included
    pub per_state: Vec<StateInvocationCount>,
}

/// The reconstructed account of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub segments: Vec<TimelineSegment>,
    pub stats: TimelineStats,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Transitions in slot order
    pub fn transitions(&self) -> Vec<&StateTransition> {
        let mut transitions: Vec<(usize, &StateTransition)> = self
            .segments
            .iter()
            .filter_map(|s| match s {
                TimelineSegment::Transition { slot, transition } => Some((*slot, transition)),
                _ => None,
            })
            .collect();
        transitions.sort_by_key(|(slot, _)| *slot);
        transitions.into_iter().map(|(_, t)| t).collect()
    }

    /// Invocations in timeline order
    pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        self.segments.iter().filter_map(|s| match s {
            TimelineSegment::Invocation { invocation, .. } => Some(invocation),
            _ => None,
        })
    }

    /// Invocations owned by the transition in `slot`
    pub fn invocations_in(&self, slot: usize) -> impl Iterator<Item = &Invocation> {
        self.segments.iter().filter_map(move |s| match s {
            TimelineSegment::Invocation {
                slot: owner,
                invocation,
            } if *owner == slot => Some(invocation),
            _ => None,
        })
    }
}

pub struct TimelineAssembler<'a> {
    config: &'a ReconstructionConfig,
}

impl<'a> TimelineAssembler<'a> {
    pub fn new(config: &'a ReconstructionConfig) -> Self {
        Self { config }
    }

    /// Assemble the timeline. Both inputs must already be deduplicated and
    /// sorted by timestamp.
    pub fn assemble(
        &self,
        transitions: Vec<StateTransition>,
        invocations: Vec<Invocation>,
        session_start: Option<&SessionStart>,
        log_start: Option<u64>,
    ) -> Timeline {
        if transitions.is_empty() && invocations.is_empty() {
            info!("No reconstructable activity in bundle");
            return Timeline::default();
        }

        let mut transitions = transitions;
        if let Some(implicit) =
            self.implicit_initial_state(&transitions, &invocations, session_start, log_start)
        {
            debug!(
                "Synthesized implicit initial state {} at {}",
                implicit.target, implicit.timestamp
            );
            transitions.insert(0, implicit);
        }

        let mut segments: Vec<TimelineSegment> =
            Vec::with_capacity(transitions.len() + invocations.len());
        for invocation in invocations {
            let slot = slot_for(&invocation, &transitions);
            segments.push(TimelineSegment::Invocation { slot, invocation });
        }
        for (slot, transition) in transitions.into_iter().enumerate() {
            segments.push(TimelineSegment::Transition { slot, transition });
        }
        // Stable: at one instant transitions keep slot order, and invocations
        // group by owning slot before keeping input order.
        segments.sort_by(|a, b| {
            (a.timestamp(), a.rank(), a.slot()).cmp(&(b.timestamp(), b.rank(), b.slot()))
        });

        let stats = compute_stats(&segments);
        info!(
            "Assembled timeline: {} states, {} transitions, {} invocations",
            stats.unique_states, stats.transition_count, stats.total_invocations
        );
        Timeline { segments, stats }
    }

    fn implicit_initial_state(
        &self,
        transitions: &[StateTransition],
        invocations: &[Invocation],
        session_start: Option<&SessionStart>,
        log_start: Option<u64>,
    ) -> Option<StateTransition> {
        let earliest = invocations.iter().map(|i| i.timestamp).min()?;
        let first = transitions.first();

        // Activity in the state the first transition left: nothing else
        // gives that state a home.
        let origin_evidence = first
            .and_then(|f| f.origin.as_deref())
            .filter(|origin| !transitions.iter().any(|t| t.target == *origin))
            .filter(|origin| invocations.iter().any(|i| i.state.as_deref() == Some(*origin)));

        let precedes = match first {
            None => true,
            Some(f) => earliest < f.timestamp,
        };
        if !precedes && origin_evidence.is_none() {
            return None;
        }

        // The marker name must not repeat the first recorded target.
        let marker_name = session_start
            .and_then(|s| s.state.as_deref())
            .filter(|name| first.map_or(true, |f| f.target != *name));
        let name = marker_name
            .or(origin_evidence)
            .unwrap_or(self.config.implicit_state_name.as_str())
            .to_string();

        let timestamp = [
            log_start,
            session_start.map(|s| s.timestamp),
            Some(earliest),
            first.map(|f| f.timestamp),
        ]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(earliest);

        Some(
            StateTransition::new(name, TriggerKind::Implicit, timestamp)
                .with_provenance(Provenance::Synthetic),
        )
    }
}

/// Slot owning an invocation: the latest visit to its attributed state at
/// or before it, else the earliest visit to that state, otherwise the
/// interval containing its timestamp. Calls after the last transition fold
/// into that transition.
fn slot_for(invocation: &Invocation, transitions: &[StateTransition]) -> usize {
    let attributed = invocation.state.as_deref().and_then(|state| {
        transitions
            .iter()
            .rposition(|t| t.target == state && t.timestamp <= invocation.timestamp)
            .or_else(|| transitions.iter().position(|t| t.target == state))
    });

    attributed
        .or_else(|| {
            transitions
                .iter()
                .rposition(|t| t.timestamp <= invocation.timestamp)
        })
        .unwrap_or(0)
}

fn compute_stats(segments: &[TimelineSegment]) -> TimelineStats {
    let mut stats = TimelineStats::default();
    let mut slot_states: Vec<(usize, &str)> = Vec::new();
    let mut real_states: Vec<&str> = Vec::new();

    for segment in segments {
        match segment {
            TimelineSegment::Transition { slot, transition } => {
                slot_states.push((*slot, transition.target.as_str()));
                if transition.is_implicit() {
                    continue;
                }
                stats.transition_count += 1;
                if transition.trigger == TriggerKind::AgentInitiated {
                    stats.agent_initiated += 1;
                }
                if !real_states.contains(&transition.target.as_str()) {
                    real_states.push(transition.target.as_str());
                }
            }
            TimelineSegment::Invocation { .. } => stats.total_invocations += 1,
        }
    }
    stats.unique_states = real_states.len();

    slot_states.sort_by_key(|(slot, _)| *slot);
    for (slot, state) in &slot_states {
        let owned = segments
            .iter()
            .filter(|s| {
                matches!(s, TimelineSegment::Invocation { slot: owner, .. } if owner == slot)
            })
            .count();
        match stats.per_state.iter_mut().find(|c| c.state == *state) {
            Some(count) => count.invocations += owned,
            None => stats.per_state.push(StateInvocationCount {
                state: state.to_string(),
                invocations: owned,
            }),
        }
    }

    let first = segments.iter().map(TimelineSegment::timestamp).min();
    let last = segments.iter().map(TimelineSegment::timestamp).max();
    if let (Some(first), Some(last)) = (first, last) {
        stats.span_us = last - first;
    }
    stats
}
