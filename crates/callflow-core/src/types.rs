//! Canonical event types
//!
//! Every raw record the normalizer accepts becomes one of two events: a
//! [`StateTransition`] or an [`Invocation`]. Both are plain values; later
//! stages produce new vectors rather than mutating shared state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString, IntoStaticStr};

/// Which log an event was read from. Session-log events win timestamp ties.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[strum(serialize = "session-log")]
    SessionLog,
    #[strum(serialize = "command-log")]
    CommandLog,
    /// Created by the assembler, not read from any log
    #[strum(serialize = "synthetic")]
    Synthetic,
}

/// Why a state transition happened
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// The agent called a function that moved the conversation
    #[strum(serialize = "agent_initiated")]
    AgentInitiated,
    /// A webhook response carried a navigation directive
    #[strum(serialize = "webhook_forced")]
    WebhookForced,
    /// A form (gather) finished
    #[strum(serialize = "form_completion")]
    FormCompletion,
    /// The platform advanced on its own
    #[strum(serialize = "automatic_advance")]
    AutomaticAdvance,
    #[strum(serialize = "unknown")]
    Unknown,
    /// Synthesized because activity preceded any recorded transition
    #[strum(serialize = "implicit")]
    Implicit,
}

impl TriggerKind {
    /// Classify the free-form cause text a step change carries.
    pub fn classify(cause: Option<&str>) -> Self {
        let Some(cause) = cause else {
            return Self::Unknown;
        };
        let cause = cause.to_ascii_lowercase();
        if cause.contains("webhook")
            || cause.contains("swaig_action")
            || cause.contains("action")
            || cause.contains("response")
        {
            Self::WebhookForced
        } else if cause.contains("function") || cause.contains("agent") {
            Self::AgentInitiated
        } else if cause.contains("gather") || cause.contains("form") {
            Self::FormCompletion
        } else if cause.contains("auto") || cause.contains("next") {
            Self::AutomaticAdvance
        } else {
            Self::Unknown
        }
    }
}

/// A move of the conversation into a new state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Destination state name
    pub target: String,
    /// Position of the state in its agent definition, when logged
    pub index: Option<u64>,
    /// State the conversation left
    pub origin: Option<String>,
    pub trigger: TriggerKind,
    /// Microseconds since the epoch
    pub timestamp: u64,
    pub provenance: Provenance,
}

impl StateTransition {
    pub fn new(target: impl Into<String>, trigger: TriggerKind, timestamp: u64) -> Self {
        Self {
            target: target.into(),
            index: None,
            origin: None,
            trigger,
            timestamp,
            provenance: Provenance::SessionLog,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn is_implicit(&self) -> bool {
        self.trigger == TriggerKind::Implicit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationKind {
    #[strum(serialize = "function")]
    Function,
    /// A form answer submission
    #[strum(serialize = "answer")]
    Answer,
}

/// One function or command call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub name: String,
    pub kind: InvocationKind,
    /// Microseconds since the epoch
    pub timestamp: u64,
    /// State the log attributed the call to
    pub state: Option<String>,
    pub request: Option<Value>,
    pub response: Option<Value>,
    pub directives: Vec<Directive>,
    /// The response navigated the conversation elsewhere
    pub forced: bool,
    /// Submitted answer recovered from the command log
    pub submitted_value: Option<Value>,
    /// Latency reported by the matching tool turn message
    pub latency_ms: Option<u64>,
    /// Attribution before the reattribution filter moved it
    pub reattributed_from: Option<String>,
    pub provenance: Provenance,
}

impl Invocation {
    pub fn new(name: impl Into<String>, timestamp: u64) -> Self {
        Self {
            name: name.into(),
            kind: InvocationKind::Function,
            timestamp,
            state: None,
            request: None,
            response: None,
            directives: Vec::new(),
            forced: false,
            submitted_value: None,
            latency_ms: None,
            reattributed_from: None,
            provenance: Provenance::SessionLog,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_kind(mut self, kind: InvocationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn with_request(mut self, request: Value) -> Self {
        self.request = Some(request);
        self
    }

    /// First navigation target among the directives
    pub fn navigation_target(&self) -> Option<&str> {
        self.directives.iter().find_map(Directive::navigation_target)
    }
}

/// Side-effect verbs a command response can carry.
///
/// The set is closed so that category mapping stays exhaustive; anything the
/// platform adds later lands in [`DirectiveVerb::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveVerb {
    #[strum(serialize = "change_step")]
    ChangeStep,
    #[strum(serialize = "change_context")]
    ChangeContext,
    #[strum(serialize = "context_switch")]
    ContextSwitch,
    #[strum(serialize = "hangup")]
    Hangup,
    #[strum(serialize = "stop")]
    Stop,
    #[strum(serialize = "set_global_data")]
    SetGlobalData,
    #[strum(serialize = "unset_global_data")]
    UnsetGlobalData,
    #[strum(serialize = "set_meta_data")]
    SetMetaData,
    #[strum(serialize = "unset_meta_data")]
    UnsetMetaData,
    #[strum(serialize = "toggle_functions")]
    ToggleFunctions,
    #[strum(serialize = "say")]
    Say,
    #[strum(serialize = "playback_bg")]
    PlaybackBg,
    #[strum(serialize = "stop_playback_bg")]
    StopPlaybackBg,
    #[strum(serialize = "SWML")]
    Swml,
    #[strum(serialize = "back_to_back_functions")]
    BackToBackFunctions,
    #[strum(default)]
    Other(String),
}

impl DirectiveVerb {
    pub fn parse(verb: &str) -> Self {
        // `default` makes this infallible
        Self::from_str(verb).unwrap_or_else(|_| Self::Other(verb.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ChangeStep => "change_step",
            Self::ChangeContext => "change_context",
            Self::ContextSwitch => "context_switch",
            Self::Hangup => "hangup",
            Self::Stop => "stop",
            Self::SetGlobalData => "set_global_data",
            Self::UnsetGlobalData => "unset_global_data",
            Self::SetMetaData => "set_meta_data",
            Self::UnsetMetaData => "unset_meta_data",
            Self::ToggleFunctions => "toggle_functions",
            Self::Say => "say",
            Self::PlaybackBg => "playback_bg",
            Self::StopPlaybackBg => "stop_playback_bg",
            Self::Swml => "SWML",
            Self::BackToBackFunctions => "back_to_back_functions",
            Self::Other(verb) => verb,
        }
    }

    pub fn category(&self) -> DirectiveCategory {
        match self {
            Self::ChangeStep | Self::ChangeContext | Self::ContextSwitch => {
                DirectiveCategory::Navigation
            }
            Self::Hangup | Self::Stop => DirectiveCategory::Termination,
            Self::SetGlobalData
            | Self::UnsetGlobalData
            | Self::SetMetaData
            | Self::UnsetMetaData
            | Self::ToggleFunctions => DirectiveCategory::DataMutation,
            Self::Say | Self::PlaybackBg | Self::StopPlaybackBg => DirectiveCategory::SpeechMedia,
            Self::Swml | Self::BackToBackFunctions | Self::Other(_) => DirectiveCategory::Generic,
        }
    }
}

impl fmt::Display for DirectiveVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual class of a directive in the projected graph
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveCategory {
    #[strum(serialize = "navigation")]
    Navigation,
    #[strum(serialize = "termination")]
    Termination,
    #[strum(serialize = "data_mutation")]
    DataMutation,
    #[strum(serialize = "speech_media")]
    SpeechMedia,
    #[strum(serialize = "generic")]
    Generic,
}

/// A side-effect instruction embedded in a command response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub verb: DirectiveVerb,
    pub value: Value,
}

impl Directive {
    pub fn new(verb: DirectiveVerb, value: Value) -> Self {
        Self { verb, value }
    }

    pub fn category(&self) -> DirectiveCategory {
        self.verb.category()
    }

    pub fn is_navigation(&self) -> bool {
        self.category() == DirectiveCategory::Navigation
    }

    /// Destination state of a navigation directive
    pub fn navigation_target(&self) -> Option<&str> {
        if !self.is_navigation() {
            return None;
        }
        match &self.value {
            Value::String(s) if !s.is_empty() => Some(s.as_str()),
            Value::Object(map) => ["step", "context", "name"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str)),
            _ => None,
        }
    }

    /// Short human-readable label, e.g. `change_step: billing`
    pub fn label(&self) -> String {
        let value = match &self.value {
            Value::Null | Value::Bool(true) => return self.verb.to_string(),
            Value::String(s) => s.clone(),
            Value::Object(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
            other => other.to_string(),
        };
        let value = if value.chars().count() > 40 {
            format!("{}...", value.chars().take(37).collect::<String>())
        } else {
            value
        };
        format!("{}: {}", self.verb, value)
    }
}
