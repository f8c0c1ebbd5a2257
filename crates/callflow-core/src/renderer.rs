//! Text renderers for timelines and graphs
//!
//! Two views: an ASCII tree of states and their calls for the terminal, and
//! a Mermaid flowchart for anything that can draw one.

use crate::graph::{EdgeKind, FlowGraph, NodeKind};
use crate::timeline::Timeline;
use crate::types::{DirectiveCategory, Invocation, StateTransition};
use ascii_tree::Tree;
use chrono::DateTime;
use tracing::warn;

/// Format a duration in microseconds the way the rest of the tooling does
pub fn format_duration_us(us: u64) -> String {
    let ms = us / 1_000;
    if ms >= 1000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else if ms > 0 {
        format!("{ms}ms")
    } else {
        format!("{us}µs")
    }
}

/// Wall-clock rendering of a microsecond timestamp
pub fn format_timestamp(us: u64) -> String {
    i64::try_from(us)
        .ok()
        .and_then(DateTime::from_timestamp_micros)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| us.to_string())
}

/// Trait for rendering timelines as ASCII trees
pub trait TimelineRenderer {
    fn render_as_ascii_tree(&self) -> String;
}

/// Render a timeline as an ASCII tree of states and the calls they own
pub fn render_ascii_tree(timeline: &Timeline) -> String {
    timeline.render_as_ascii_tree()
}

impl TimelineRenderer for Timeline {
    fn render_as_ascii_tree(&self) -> String {
        let start = self.segments.first().map(|s| s.timestamp()).unwrap_or(0);
        let root_label = if self.is_empty() {
            "📞 Session timeline - no reconstructable activity".to_string()
        } else {
            format!(
                "📞 Session timeline @ {} - {} states, {} transitions, {} calls (span: {})",
                format_timestamp(start),
                self.stats.unique_states,
                self.stats.transition_count,
                self.stats.total_invocations,
                format_duration_us(self.stats.span_us)
            )
        };

        let children = self
            .transitions()
            .into_iter()
            .enumerate()
            .map(|(slot, transition)| {
                let calls = self
                    .invocations_in(slot)
                    .map(|invocation| render_invocation(invocation, start))
                    .collect();
                Tree::Node(render_transition(transition, start), calls)
            })
            .collect();

        let tree = Tree::Node(root_label, children);
        let mut buffer = String::new();
        if let Err(e) = ascii_tree::write_tree(&mut buffer, &tree) {
            warn!("Failed to render timeline tree: {e}");
        }
        buffer
    }
}

fn render_transition(transition: &StateTransition, start: u64) -> String {
    let offset = format_duration_us(transition.timestamp.saturating_sub(start));
    let origin = transition
        .origin
        .as_deref()
        .map(|o| format!(" from {o}"))
        .unwrap_or_default();
    let icon = if transition.is_implicit() { "💭" } else { "🔄" };
    format!(
        "{icon} +{offset} {}{origin} ({})",
        transition.target, transition.trigger
    )
}

fn render_invocation(invocation: &Invocation, start: u64) -> Tree {
    let offset = format_duration_us(invocation.timestamp.saturating_sub(start));
    let mut label = format!("🔧 +{offset} {} [{}]", invocation.name, invocation.kind);
    if let Some(latency) = invocation.latency_ms {
        label.push_str(&format!(" ({latency}ms)"));
    }
    if let Some(from) = &invocation.reattributed_from {
        label.push_str(&format!(" ↩ logged under {from}"));
    }

    let mut details = Vec::new();
    if let Some(value) = &invocation.submitted_value {
        details.push(Tree::Leaf(vec![format!("📝 Answer: {}", preview(value))]));
    }
    for directive in &invocation.directives {
        details.push(Tree::Leaf(vec![format!(
            "{} {}",
            category_icon(directive.category()),
            directive.label()
        )]));
    }
    Tree::Node(label, details)
}

fn preview(value: &serde_json::Value) -> String {
    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > 80 {
        format!("{}...", text.chars().take(77).collect::<String>())
    } else {
        text
    }
}

fn category_icon(category: DirectiveCategory) -> &'static str {
    match category {
        DirectiveCategory::Navigation => "➡️",
        DirectiveCategory::Termination => "⛔",
        DirectiveCategory::DataMutation => "💾",
        DirectiveCategory::SpeechMedia => "🔊",
        DirectiveCategory::Generic => "📦",
    }
}

/// Render a graph as a Mermaid flowchart
pub fn render_mermaid(graph: &FlowGraph) -> String {
    let mut lines = vec!["flowchart TD".to_string()];

    for node in &graph.nodes {
        let label = escape_label(&node.label);
        let shape = match node.kind {
            NodeKind::State => format!("    {}[\"{label}\"]", node.id),
            NodeKind::Invocation => format!("    {}([\"{label}\"])", node.id),
            NodeKind::Directive(_) => format!("    {}{{{{\"{label}\"}}}}", node.id),
        };
        lines.push(shape);
    }

    for edge in &graph.edges {
        let label = escape_label(&edge.label);
        let arrow = match edge.kind {
            EdgeKind::Transition => "-->",
            EdgeKind::Invocation | EdgeKind::Directive => "---",
            EdgeKind::Reference => "-.->",
        };
        if label.is_empty() {
            lines.push(format!("    {} {arrow} {}", edge.from, edge.to));
        } else {
            lines.push(format!("    {} {arrow}|{label}| {}", edge.from, edge.to));
        }
    }

    lines.push(String::new());
    lines.push("classDef state fill:#e1f5fe".to_string());
    lines.push("classDef invocation fill:grey".to_string());
    lines.push("classDef navigation fill:#fff3e0".to_string());
    lines.push("classDef termination fill:#ffebee".to_string());
    lines.push("classDef data_mutation fill:#f3e5f5".to_string());
    lines.push("classDef speech_media fill:#e8f5e8".to_string());
    lines.push("classDef generic fill:#eeeeee".to_string());

    for node in &graph.nodes {
        let class = match node.kind {
            NodeKind::State => "state",
            NodeKind::Invocation => "invocation",
            NodeKind::Directive(category) => category.into(),
        };
        lines.push(format!("class {} {class}", node.id));
    }

    lines.join("\n")
}

fn escape_label(label: &str) -> String {
    label.replace('"', "&quot;").replace('|', "&#124;")
}
