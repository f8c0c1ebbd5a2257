//! Raw log bundle
//!
//! A bundle is the two arrays an external loader pulls out of an uploaded
//! session document: the structured session log and the command log.
//! Elements are read field by field so that one odd record never costs the
//! rest of the document; anything missing becomes a neutral default.

use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

/// One record from the structured session log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLogEntry {
    /// Role tag (`system-log`, `assistant`, `user`, `tool`, ...)
    pub role: String,
    /// Action tag for platform entries (`step_change`, `function_call`, ...)
    pub action: Option<String>,
    /// Microseconds since the epoch
    pub timestamp: u64,
    /// Action-specific metadata
    pub metadata: Map<String, Value>,
    /// Free text, carried by diagnostic markers and turn messages
    pub content: Option<String>,
    /// Function name on tool turn messages
    pub name: Option<String>,
    /// Reported latency in milliseconds on turn messages
    pub latency_ms: Option<u64>,
}

/// One record from the command log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCommandEntry {
    pub command_name: String,
    /// Issue time in microseconds since the epoch
    pub issued_at_us: u64,
    /// Request argument payload; JSON-in-a-string arguments are decoded
    pub request: Option<Value>,
    /// Response payload, possibly holding an `action` list
    pub response: Option<Value>,
}

/// The two raw arrays of one closed session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogBundle {
    pub session_log: Vec<RawLogEntry>,
    pub command_log: Vec<RawCommandEntry>,
}

impl LogBundle {
    pub fn new(session_log: Vec<RawLogEntry>, command_log: Vec<RawCommandEntry>) -> Self {
        Self {
            session_log,
            command_log,
        }
    }

    /// Parse a bundle from JSON text
    pub fn from_json_str(content: &str) -> FlowResult<Self> {
        debug!("Parsing log bundle (length: {})", content.len());
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value)
    }

    /// Read and parse a bundle from disk
    pub fn from_path(path: &Path) -> FlowResult<Self> {
        info!("Loading log bundle: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Build a bundle from an already parsed document.
    ///
    /// A top-level array is read as a bare session log. Objects may use
    /// either the canonical keys (`session_log`, `command_log`) or the
    /// platform's own (`call_log`, `swaig_log`).
    pub fn from_value(value: &Value) -> FlowResult<Self> {
        let (session, command) = match value {
            Value::Array(items) => (Some(items.as_slice()), None),
            Value::Object(map) => (
                array_field(map, &["session_log", "call_log"]),
                array_field(map, &["command_log", "swaig_log"]),
            ),
            other => {
                return Err(FlowError::invalid_bundle(format!(
                    "expected an object or array at top level, found {}",
                    value_kind(other)
                )))
            }
        };

        let session_log: Vec<RawLogEntry> = session
            .unwrap_or_default()
            .iter()
            .map(RawLogEntry::from_value)
            .collect();
        let command_log: Vec<RawCommandEntry> = command
            .unwrap_or_default()
            .iter()
            .map(RawCommandEntry::from_value)
            .collect();

        debug!(
            "Loaded bundle with {} session entries and {} command entries",
            session_log.len(),
            command_log.len()
        );
        Ok(Self::new(session_log, command_log))
    }

    /// Earliest timestamp across both logs, ignoring zero (unknown) stamps
    pub fn earliest_timestamp(&self) -> Option<u64> {
        self.session_log
            .iter()
            .map(|e| e.timestamp)
            .chain(self.command_log.iter().map(|c| c.issued_at_us))
            .filter(|t| *t > 0)
            .min()
    }

    pub fn is_empty(&self) -> bool {
        self.session_log.is_empty() && self.command_log.is_empty()
    }
}

impl RawLogEntry {
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let metadata = obj
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let name = first_str(obj, &["name"]).or_else(|| first_str(&metadata, &["function"]));
        Self {
            role: to_str(obj.get("role")),
            action: first_str(obj, &["action"]),
            timestamp: to_u64(obj.get("timestamp")),
            content: first_str(obj, &["content", "message"]),
            name,
            latency_ms: first_u64(obj, &["latency", "execution_latency"]),
            metadata,
        }
    }

    /// Look up the first present, non-empty string among metadata keys
    pub fn meta_str(&self, keys: &[&str]) -> Option<String> {
        first_str(&self.metadata, keys)
    }

    pub fn meta_u64(&self, keys: &[&str]) -> Option<u64> {
        first_u64(&self.metadata, keys)
    }

    pub fn meta_value(&self, keys: &[&str]) -> Option<Value> {
        keys.iter()
            .filter_map(|k| self.metadata.get(*k))
            .find(|v| !v.is_null())
            .cloned()
    }
}

impl RawCommandEntry {
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let request = ["command_arg", "args", "request"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .find(|v| !v.is_null())
            .map(decode_embedded_json);
        let response = ["post_response", "response"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .find(|v| !v.is_null())
            .map(decode_embedded_json);
        Self {
            command_name: first_str(obj, &["command_name", "command", "name"]).unwrap_or_default(),
            issued_at_us: seconds_to_micros(obj.get("epoch_time")),
            request,
            response,
        }
    }
}

fn array_field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a [Value]> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find_map(|v| v.as_array().map(Vec::as_slice))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Arguments and responses are frequently logged as JSON serialized into a
/// string. Decode those; keep anything else as-is.
fn decode_embedded_json(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                serde_json::from_str(s).unwrap_or_else(|_| value.clone())
            } else {
                value.clone()
            }
        }
        other => other.clone(),
    }
}

fn to_str(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn to_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

fn seconds_to_micros(value: Option<&Value>) -> u64 {
    let seconds = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1_000_000.0).round() as u64
    } else {
        0
    }
}

fn first_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .map(|k| to_str(map.get(*k)))
        .find(|s| !s.is_empty())
}

fn first_u64(map: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
        .map(|v| to_u64(Some(v)))
}
