//! Log normalization
//!
//! Turns the three raw record shapes (structured session entries, command-log
//! entries and free-text diagnostic markers) into candidate
//! [`StateTransition`]s and [`Invocation`]s with one timestamp unit.

use crate::config::ReconstructionConfig;
use crate::raw::{LogBundle, RawCommandEntry, RawLogEntry};
use crate::types::{Invocation, InvocationKind, Provenance, StateTransition, TriggerKind};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const ACTION_STEP_CHANGE: &str = "step_change";
pub const ACTION_FUNCTION_CALL: &str = "function_call";
pub const ACTION_GATHER_ANSWER: &str = "gather_answer";
pub const ACTION_SESSION_START: &str = "session_start";

/// Role of conversational turn messages that report tool latency
pub const TOOL_ROLE: &str = "tool";

/// Stand-in for a required name the record did not carry
pub const UNKNOWN_NAME: &str = "unknown";

fn step_marker_re() -> &'static Regex {
    static STEP_MARKER_RE: OnceLock<Regex> = OnceLock::new();
    STEP_MARKER_RE.get_or_init(|| {
        Regex::new(
            r#"(?i)\bstep\s+(?:changed|change|transitioned|transition)\s+(?:from\s+['"]?(?P<from>[\w.\-]+)['"]?\s+)?to\s+['"]?(?P<to>[\w.\-]+)['"]?(?:\s+(?:via|by|due\s+to|on)\s+['"]?(?P<cause>[\w.\-]+))?"#,
        )
        .expect("valid step marker regex")
    })
}

fn call_marker_re() -> &'static Regex {
    static CALL_MARKER_RE: OnceLock<Regex> = OnceLock::new();
    CALL_MARKER_RE.get_or_init(|| {
        Regex::new(
            r#"(?i)\b(?:calling|executing|invoking)\s+(?:swaig\s+)?(?:function|tool)\s+['"]?(?P<name>[\w.\-]+)"#,
        )
        .expect("valid call marker regex")
    })
}

/// The session-start marker, if the log had one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStart {
    pub timestamp: u64,
    /// Initial state named by the marker
    pub state: Option<String>,
}

/// A tool turn message that reported latency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnMessage {
    pub name: Option<String>,
    pub timestamp: u64,
    pub latency_ms: u64,
}

/// Output of the normalizer, sorted by (timestamp, provenance, input order)
#[derive(Debug, Clone, Default)]
pub struct NormalizedLog {
    pub transitions: Vec<StateTransition>,
    pub invocations: Vec<Invocation>,
    pub turns: Vec<TurnMessage>,
    pub session_start: Option<SessionStart>,
    /// Earliest non-zero timestamp anywhere in the bundle
    pub log_start: Option<u64>,
}

pub struct Normalizer<'a> {
    config: &'a ReconstructionConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a ReconstructionConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&self, bundle: &LogBundle) -> NormalizedLog {
        let mut out = NormalizedLog {
            log_start: bundle.earliest_timestamp(),
            ..Default::default()
        };

        for entry in &bundle.session_log {
            self.normalize_session_entry(entry, &mut out);
        }

        let session_names: BTreeSet<String> =
            out.invocations.iter().map(|i| i.name.clone()).collect();
        for entry in &bundle.command_log {
            if let Some(invocation) = gap_fill(entry, &session_names) {
                out.invocations.push(invocation);
            }
        }

        out.transitions.sort_by_key(|t| (t.timestamp, t.provenance));
        out.invocations.sort_by_key(|i| (i.timestamp, i.provenance));
        out.turns.sort_by_key(|t| t.timestamp);
        backfill_origins(&mut out.transitions);

        debug!(
            "Normalized {} transitions, {} invocations, {} turn messages",
            out.transitions.len(),
            out.invocations.len(),
            out.turns.len()
        );
        out
    }

    fn normalize_session_entry(&self, entry: &RawLogEntry, out: &mut NormalizedLog) {
        if entry.role != self.config.diagnostic_role {
            if entry.role == TOOL_ROLE {
                if let Some(latency_ms) = entry.latency_ms {
                    out.turns.push(TurnMessage {
                        name: entry.name.clone(),
                        timestamp: entry.timestamp,
                        latency_ms,
                    });
                }
            }
            return;
        }

        match entry.action.as_deref() {
            Some(ACTION_STEP_CHANGE) => out.transitions.push(step_change(entry)),
            Some(ACTION_FUNCTION_CALL) => out.invocations.push(function_call(entry)),
            Some(ACTION_GATHER_ANSWER) => out.invocations.push(self.gather_answer(entry)),
            Some(ACTION_SESSION_START) => {
                out.session_start = Some(SessionStart {
                    timestamp: entry.timestamp,
                    state: entry.meta_str(&["step", "step_name", "state"]),
                });
            }
            _ => {
                if let Some(content) = entry.content.as_deref() {
                    parse_marker(content, entry.timestamp, out);
                }
            }
        }
    }

    fn gather_answer(&self, entry: &RawLogEntry) -> Invocation {
        let mut invocation = Invocation::new(&self.config.submission_command, entry.timestamp)
            .with_kind(InvocationKind::Answer);
        invocation.state = entry.meta_str(&["step", "step_name"]);
        invocation
    }
}

fn step_change(entry: &RawLogEntry) -> StateTransition {
    let target = entry
        .meta_str(&["step", "step_name", "to"])
        .unwrap_or_else(|| {
            warn!("step_change at {} has no target step", entry.timestamp);
            UNKNOWN_NAME.to_string()
        });
    let cause = entry.meta_str(&["trigger", "reason", "source"]);
    let trigger = TriggerKind::classify(cause.as_deref());
    let origin = entry
        .meta_str(&["previous_step", "from"])
        .filter(|origin| *origin != target);
    let mut transition = StateTransition::new(target, trigger, entry.timestamp);
    if let Some(index) = entry.meta_u64(&["step_index", "index"]) {
        transition = transition.with_index(index);
    }
    if let Some(origin) = origin {
        transition = transition.with_origin(origin);
    }
    transition
}

fn function_call(entry: &RawLogEntry) -> Invocation {
    let name = entry
        .meta_str(&["function", "name", "command_name"])
        .or_else(|| entry.name.clone())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
    let mut invocation = Invocation::new(name, entry.timestamp);
    invocation.state = entry.meta_str(&["step", "step_name"]);
    invocation.request = entry.meta_value(&["arguments", "args"]);
    invocation
}

fn parse_marker(content: &str, timestamp: u64, out: &mut NormalizedLog) {
    if let Some(caps) = step_marker_re().captures(content) {
        let mut transition = StateTransition::new(
            &caps["to"],
            TriggerKind::classify(caps.name("cause").map(|m| m.as_str())),
            timestamp,
        );
        transition.origin = caps.name("from").map(|m| m.as_str().to_string());
        out.transitions.push(transition);
    } else if let Some(caps) = call_marker_re().captures(content) {
        out.invocations.push(Invocation::new(&caps["name"], timestamp));
    }
}

/// Name a command-log entry is queued and matched under
pub(crate) fn command_key(entry: &RawCommandEntry) -> &str {
    if entry.command_name.is_empty() {
        UNKNOWN_NAME
    } else {
        &entry.command_name
    }
}

/// Commands that never reach the session log (a hangup, for instance) are
/// only visible in the command log.
fn gap_fill(entry: &RawCommandEntry, session_names: &BTreeSet<String>) -> Option<Invocation> {
    let name = command_key(entry);
    if session_names.contains(name) {
        return None;
    }
    let mut invocation =
        Invocation::new(name, entry.issued_at_us).with_provenance(Provenance::CommandLog);
    invocation.request = entry.request.clone();
    Some(invocation)
}

/// A transition without an origin left the previous transition's target. A
/// repeat record of the same change (a marker echoing a structured entry)
/// inherits the origin of the record it repeats instead.
fn backfill_origins(transitions: &mut [StateTransition]) {
    for i in 1..transitions.len() {
        if transitions[i].origin.is_some() {
            continue;
        }
        let previous = &transitions[i - 1];
        let origin = if previous.target != transitions[i].target {
            Some(previous.target.clone())
        } else {
            previous.origin.clone()
        };
        transitions[i].origin = origin;
    }
}
