//! Tests for the text renderers

use callflow_core::renderer::{format_duration_us, format_timestamp};
use callflow_core::{
    reconstruct_with_graph, render_ascii_tree, render_mermaid, LogBundle, ReconstructionConfig,
    Timeline, TimelineRenderer,
};

const SUPPORT_CALL: &str = include_str!("fixtures/support_call.json");

fn support_call() -> callflow_core::Reconstruction {
    let bundle = LogBundle::from_json_str(SUPPORT_CALL).unwrap();
    reconstruct_with_graph(&bundle, &ReconstructionConfig::default())
}

#[test]
fn test_render_mermaid() {
    let result = support_call();
    let mermaid = render_mermaid(&result.graph);

    assert!(mermaid.starts_with("flowchart TD"));
    assert!(mermaid.contains("    state_greeting[\"greeting\"]"));
    assert!(mermaid.contains("    state_greeting -->|webhook_forced| state_billing"));
    assert!(mermaid.contains("    state_greeting ---|function| call_1_lookup_account"));
    assert!(mermaid.contains("    call_2_verify_identity_d1 -.->|navigates| state_billing"));
    assert!(mermaid.contains("classDef state fill:#e1f5fe"));
    assert!(mermaid.contains("class call_2_verify_identity_d1 navigation"));
    assert!(mermaid.contains("class call_4_hangup_call_d1 termination"));
}

#[test]
fn test_render_mermaid_escapes_quotes() {
    let result = support_call();
    let mermaid = render_mermaid(&result.graph);
    // Directive label `say: Thanks, you're verified.` has no double quote,
    // but the rendering must never contain a raw one inside a label.
    for line in mermaid.lines().filter(|l| l.contains("{{")) {
        assert_eq!(line.matches('"').count(), 2, "{line}");
    }
}

#[test]
fn test_render_ascii_tree() {
    let result = support_call();
    let tree = render_ascii_tree(&result.timeline);

    assert!(tree.contains("Session timeline @ 2023-11-14T22:13:20.000Z"));
    assert!(tree.contains("2 states, 2 transitions, 4 calls (span: 6.00s)"));
    assert!(tree.contains("💭 +0µs greeting (implicit)"));
    assert!(tree.contains("billing from greeting (webhook_forced)"));
    assert!(tree.contains("verify_identity [function] (320ms) ↩ logged under billing"));
    assert!(tree.contains("📝 Answer: yes"));
    assert!(tree.contains("➡️ change_step: billing"));
    assert!(tree.contains("⛔ hangup"));
    assert_eq!(tree, result.timeline.render_as_ascii_tree());
}

#[test]
fn test_render_empty_timeline() {
    let tree = render_ascii_tree(&Timeline::default());
    assert!(tree.contains("no reconstructable activity"));
}

#[test]
fn test_format_helpers() {
    assert_eq!(format_duration_us(500), "500µs");
    assert_eq!(format_duration_us(50_000), "50ms");
    assert_eq!(format_duration_us(2_500_000), "2.50s");
    assert_eq!(format_timestamp(0), "1970-01-01T00:00:00.000Z");
}
