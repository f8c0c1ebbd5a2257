use anyhow::{Context, Result};
use ascii_tree::{write_tree, Tree};
use callflow_core::renderer::format_duration_us;
use callflow_core::{render_ascii_tree, render_mermaid, Reconstruction, TimelineStats};
use clap::ValueEnum;

/// How the runner prints a reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII tree of states and calls
    Tree,
    /// Mermaid flowchart of the projected graph
    Mermaid,
    Json,
    Yaml,
}

/// Renders a reconstruction in the requested format.
///
/// `include_graph` adds the projected graph to the tree view (as Mermaid) and
/// to the structured formats; Mermaid output always is the graph.
pub fn render(
    result: &Reconstruction,
    format: OutputFormat,
    include_graph: bool,
) -> Result<String> {
    match format {
        OutputFormat::Tree => {
            let mut output = render_ascii_tree(&result.timeline);
            output.push('\n');
            output.push_str(&render_stats_as_tree(&result.timeline.stats));
            if include_graph {
                output.push('\n');
                output.push_str(&render_mermaid(&result.graph));
                output.push('\n');
            }
            Ok(output)
        }
        OutputFormat::Mermaid => Ok(render_mermaid(&result.graph)),
        OutputFormat::Json => {
            if include_graph {
                result.to_json().context("Failed to serialize reconstruction as JSON")
            } else {
                serde_json::to_string_pretty(&result.timeline)
                    .context("Failed to serialize timeline as JSON")
            }
        }
        OutputFormat::Yaml => {
            if include_graph {
                result.to_yaml().context("Failed to serialize reconstruction as YAML")
            } else {
                serde_yaml::to_string(&result.timeline)
                    .context("Failed to serialize timeline as YAML")
            }
        }
    }
}

/// Renders the aggregate statistics as a small ASCII tree.
pub fn render_stats_as_tree(stats: &TimelineStats) -> String {
    let root_label = format!(
        "📊 {} states, {} transitions ({} agent-initiated), {} calls over {}",
        stats.unique_states,
        stats.transition_count,
        stats.agent_initiated,
        stats.total_invocations,
        format_duration_us(stats.span_us)
    );

    let per_state = stats
        .per_state
        .iter()
        .map(|count| Tree::Leaf(vec![format!("{}: {} calls", count.state, count.invocations)]))
        .collect();

    let tree = Tree::Node(root_label, per_state);
    let mut buffer = String::new();
    if write_tree(&mut buffer, &tree).is_err() {
        tracing::warn!("Failed to render statistics tree");
    }
    buffer
}
