//! Graph projection
//!
//! Derives a node/edge graph from an assembled [`Timeline`]: one node per
//! unique state, one per invocation and one per directive. Node ids are
//! derived from labels and safe to use as Mermaid identifiers.

use crate::timeline::Timeline;
use crate::types::{DirectiveCategory, TriggerKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flow graph for visualization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "category", rename_all = "snake_case")]
pub enum NodeKind {
    State,
    Invocation,
    Directive(DirectiveCategory),
}

/// Flow node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// State to state, labeled with the trigger
    Transition,
    /// State to one of its invocations; invocations are never chained
    Invocation,
    /// Invocation to one of its directives
    Directive,
    /// Navigation directive to the state it names
    Reference,
}

/// Flow edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    pub label: String,
    pub kind: EdgeKind,
}

impl FlowGraph {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Id of the node for the state labeled `name`
    pub fn state_node_id(&self, name: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.kind == NodeKind::State && n.label == name)
            .map(|n| n.id.as_str())
    }

    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &FlowEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a FlowEdge> {
        self.edges.iter().filter(move |e| e.from == id)
    }
}

/// Sanitize a label for use as a Mermaid identifier
pub fn sanitize_id(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
}

/// Project a timeline into a graph
pub fn project(timeline: &Timeline) -> FlowGraph {
    let mut graph = FlowGraph::default();
    let transitions = timeline.transitions();

    // state name -> node id, in first-appearance order
    let mut state_ids: BTreeMap<&str, String> = BTreeMap::new();
    for transition in &transitions {
        if state_ids.contains_key(transition.target.as_str()) {
            continue;
        }
        let id = unique_id(&graph, format!("state_{}", sanitize_id(&transition.target)));
        state_ids.insert(transition.target.as_str(), id.clone());
        graph.nodes.push(FlowNode {
            id,
            label: transition.target.clone(),
            kind: NodeKind::State,
        });
    }

    for pair in transitions.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        graph.edges.push(FlowEdge {
            from: state_ids[prev.target.as_str()].clone(),
            to: state_ids[next.target.as_str()].clone(),
            label: trigger_label(next.trigger).to_string(),
            kind: EdgeKind::Transition,
        });
    }

    let mut call_index = 0;
    for (slot, transition) in transitions.iter().enumerate() {
        let state_id = state_ids[transition.target.as_str()].clone();
        for invocation in timeline.invocations_in(slot) {
            call_index += 1;
            let call_id = format!("call_{}_{}", call_index, sanitize_id(&invocation.name));
            graph.nodes.push(FlowNode {
                id: call_id.clone(),
                label: invocation.name.clone(),
                kind: NodeKind::Invocation,
            });
            graph.edges.push(FlowEdge {
                from: state_id.clone(),
                to: call_id.clone(),
                label: invocation.kind.to_string(),
                kind: EdgeKind::Invocation,
            });

            for (d, directive) in invocation.directives.iter().enumerate() {
                let directive_id = format!("{}_d{}", call_id, d + 1);
                let category = directive.category();
                graph.nodes.push(FlowNode {
                    id: directive_id.clone(),
                    label: directive.label(),
                    kind: NodeKind::Directive(category),
                });
                graph.edges.push(FlowEdge {
                    from: call_id.clone(),
                    to: directive_id.clone(),
                    label: category.to_string(),
                    kind: EdgeKind::Directive,
                });
                if let Some(target_id) = directive
                    .navigation_target()
                    .and_then(|target| state_ids.get(target))
                {
                    graph.edges.push(FlowEdge {
                        from: directive_id,
                        to: target_id.clone(),
                        label: "navigates".to_string(),
                        kind: EdgeKind::Reference,
                    });
                }
            }
        }
    }

    graph
}

fn trigger_label(trigger: TriggerKind) -> &'static str {
    trigger.into()
}

/// Two states can sanitize to the same id (`a-b` and `a_b`); suffix later ones.
fn unique_id(graph: &FlowGraph, base: String) -> String {
    if graph.node(&base).is_none() {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if graph.node(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}
