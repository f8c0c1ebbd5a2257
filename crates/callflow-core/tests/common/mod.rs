//! Builders for raw session and command log records used across the
//! integration tests. Timestamps are microseconds unless a name says otherwise.

#![allow(dead_code)]

use callflow_core::LogBundle;
use serde_json::{json, Value};

pub fn step_change(timestamp: u64, step: &str, previous: Option<&str>, trigger: &str) -> Value {
    let mut metadata = json!({ "step": step, "trigger": trigger });
    if let Some(previous) = previous {
        metadata["previous_step"] = json!(previous);
    }
    json!({
        "role": "system-log",
        "action": "step_change",
        "timestamp": timestamp,
        "metadata": metadata,
    })
}

pub fn function_call(timestamp: u64, function: &str, step: Option<&str>) -> Value {
    let mut metadata = json!({ "function": function });
    if let Some(step) = step {
        metadata["step"] = json!(step);
    }
    json!({
        "role": "system-log",
        "action": "function_call",
        "timestamp": timestamp,
        "metadata": metadata,
    })
}

pub fn gather_answer(timestamp: u64, step: &str) -> Value {
    json!({
        "role": "system-log",
        "action": "gather_answer",
        "timestamp": timestamp,
        "metadata": { "step": step },
    })
}

pub fn session_start(timestamp: u64, step: &str) -> Value {
    json!({
        "role": "system-log",
        "action": "session_start",
        "timestamp": timestamp,
        "metadata": { "step": step },
    })
}

/// Free-text diagnostic marker
pub fn marker(timestamp: u64, content: &str) -> Value {
    json!({
        "role": "system-log",
        "timestamp": timestamp,
        "content": content,
    })
}

pub fn tool_turn(timestamp: u64, name: &str, latency_ms: u64) -> Value {
    json!({
        "role": "tool",
        "timestamp": timestamp,
        "name": name,
        "latency": latency_ms,
        "content": "{\"response\":\"ok\"}",
    })
}

/// Command-log record issued at `epoch_seconds`
pub fn command(epoch_seconds: f64, name: &str, arg: Value, response: Value) -> Value {
    json!({
        "command_name": name,
        "epoch_time": epoch_seconds,
        "command_arg": arg,
        "post_response": response,
    })
}

pub fn navigate_to(step: &str) -> Value {
    json!({ "response": "moving on", "action": [{ "change_step": step }] })
}

pub fn bundle(session_log: Vec<Value>, command_log: Vec<Value>) -> LogBundle {
    LogBundle::from_value(&json!({
        "call_log": session_log,
        "swaig_log": command_log,
    }))
    .expect("object bundles always load")
}
