//! Tests for command/response correlation

use callflow_core::{
    extract_directives, CommandCorrelator, CommandQueues, DirectiveCategory, DirectiveVerb,
    Invocation, InvocationKind, RawCommandEntry, ReconstructionConfig, TurnMessage,
};
use rstest::rstest;
use serde_json::{json, Value};

fn entry(name: &str, issued_at_us: u64, response: Value) -> RawCommandEntry {
    RawCommandEntry {
        command_name: name.to_string(),
        issued_at_us,
        request: None,
        response: Some(response),
    }
}

#[test]
fn test_fifo_not_nearest_timestamp() {
    let config = ReconstructionConfig::default();
    let invocations = vec![
        Invocation::new("lookup", 1_000_000),
        Invocation::new("lookup", 1_500_000),
    ];
    // Both records sit closer to the second invocation
    let command_log = vec![
        entry("lookup", 1_450_000, json!({"response": "second"})),
        entry("lookup", 1_400_000, json!({"response": "first"})),
    ];

    let correlated = CommandCorrelator::new(&config).correlate(invocations, &command_log);

    assert_eq!(correlated[0].response, Some(json!({"response": "first"})));
    assert_eq!(correlated[1].response, Some(json!({"response": "second"})));
}

#[test]
fn test_queues_are_per_command_name() {
    let command_log = vec![
        entry("transfer", 3, json!({})),
        entry("lookup", 2, json!({})),
        entry("lookup", 1, json!({})),
    ];
    let mut queues = CommandQueues::new(&command_log);

    assert_eq!(queues.remaining(), 3);
    assert_eq!(queues.next("lookup").map(|e| e.issued_at_us), Some(1));
    assert_eq!(queues.next("transfer").map(|e| e.issued_at_us), Some(3));
    assert_eq!(queues.next("lookup").map(|e| e.issued_at_us), Some(2));
    assert!(queues.next("lookup").is_none());
    assert!(queues.next("missing").is_none());
    assert_eq!(queues.remaining(), 0);
}

#[test]
fn test_unmatched_invocation_keeps_empty_directives() {
    let config = ReconstructionConfig::default();
    let invocations = vec![
        Invocation::new("lookup", 1_000),
        Invocation::new("lookup", 2_000),
    ];
    let command_log = vec![entry(
        "lookup",
        900,
        json!({"action": [{"change_step": "billing"}]}),
    )];

    let correlated = CommandCorrelator::new(&config).correlate(invocations, &command_log);

    assert!(correlated[0].forced);
    assert_eq!(correlated[0].navigation_target(), Some("billing"));
    assert!(!correlated[1].forced);
    assert!(correlated[1].directives.is_empty());
    assert_eq!(correlated[1].response, None);
}

#[test]
fn test_answer_recovery_in_order() {
    let config = ReconstructionConfig::default();
    let answer = |ts| Invocation::new("gather_submit", ts).with_kind(InvocationKind::Answer);
    let invocations = vec![answer(1_000), answer(5_000)];
    let command_log = vec![
        RawCommandEntry {
            command_name: "gather_submit".to_string(),
            issued_at_us: 1_100,
            request: Some(json!({"answer": "yes"})),
            response: None,
        },
        RawCommandEntry {
            command_name: "gather_submit".to_string(),
            issued_at_us: 5_100,
            request: Some(json!({"question": "zip"})),
            response: None,
        },
    ];

    let correlated = CommandCorrelator::new(&config).correlate(invocations, &command_log);

    assert_eq!(correlated[0].submitted_value, Some(json!("yes")));
    // No `answer` field: the whole argument is the value
    assert_eq!(correlated[1].submitted_value, Some(json!({"question": "zip"})));
    assert_eq!(correlated[1].request, Some(json!({"question": "zip"})));
}

#[test]
fn test_session_request_not_overwritten() {
    let config = ReconstructionConfig::default();
    let invocations =
        vec![Invocation::new("lookup", 1_000).with_request(json!({"from": "session"}))];
    let command_log = vec![RawCommandEntry {
        command_name: "lookup".to_string(),
        issued_at_us: 1_000,
        request: Some(json!({"from": "command"})),
        response: None,
    }];

    let correlated = CommandCorrelator::new(&config).correlate(invocations, &command_log);
    assert_eq!(correlated[0].request, Some(json!({"from": "session"})));
}

#[test]
fn test_extract_directives() {
    let response = json!({
        "response": "ok",
        "action": [
            {"set_global_data": {"verified": true}},
            {"say": "One moment"},
            {"change_step": "billing", "stop": true},
            {"SWML": {"version": "1.0.0"}},
            {"play_ringtone": "us"},
        ]
    });

    let directives = extract_directives(&response);
    let verbs: Vec<&str> = directives.iter().map(|d| d.verb.as_str()).collect();
    assert_eq!(
        verbs,
        vec!["set_global_data", "say", "change_step", "stop", "SWML", "play_ringtone"]
    );
    assert_eq!(directives[5].verb, DirectiveVerb::Other("play_ringtone".to_string()));
    assert_eq!(directives[5].category(), DirectiveCategory::Generic);
    assert_eq!(directives[2].label(), "change_step: billing");
    assert_eq!(directives[3].label(), "stop");
}

#[test]
fn test_extract_directives_single_object_and_none() {
    let single = extract_directives(&json!({"action": {"hangup": true}}));
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].category(), DirectiveCategory::Termination);

    assert!(extract_directives(&json!({"response": "no actions"})).is_empty());
    assert!(extract_directives(&json!("plain text")).is_empty());
}

#[rstest]
#[case("change_step", DirectiveCategory::Navigation)]
#[case("change_context", DirectiveCategory::Navigation)]
#[case("context_switch", DirectiveCategory::Navigation)]
#[case("hangup", DirectiveCategory::Termination)]
#[case("stop", DirectiveCategory::Termination)]
#[case("set_global_data", DirectiveCategory::DataMutation)]
#[case("unset_global_data", DirectiveCategory::DataMutation)]
#[case("set_meta_data", DirectiveCategory::DataMutation)]
#[case("unset_meta_data", DirectiveCategory::DataMutation)]
#[case("toggle_functions", DirectiveCategory::DataMutation)]
#[case("say", DirectiveCategory::SpeechMedia)]
#[case("playback_bg", DirectiveCategory::SpeechMedia)]
#[case("stop_playback_bg", DirectiveCategory::SpeechMedia)]
#[case("SWML", DirectiveCategory::Generic)]
#[case("back_to_back_functions", DirectiveCategory::Generic)]
#[case("something_new", DirectiveCategory::Generic)]
fn test_directive_categories(#[case] verb: &str, #[case] expected: DirectiveCategory) {
    let parsed = DirectiveVerb::parse(verb);
    assert_eq!(parsed.category(), expected);
    assert_eq!(parsed.as_str(), verb);
}

#[test]
fn test_navigation_target_from_object_value() {
    let directives = extract_directives(&json!({
        "action": [{"change_context": {"context": "support", "step": "intro"}}]
    }));
    assert_eq!(directives[0].navigation_target(), Some("intro"));
}

#[test]
fn test_turn_latency_prefers_same_name() {
    let config = ReconstructionConfig::default();
    let invocations = vec![
        Invocation::new("lookup", 1_000_000),
        Invocation::new("transfer", 1_100_000),
    ];
    let turns = vec![TurnMessage {
        name: Some("lookup".to_string()),
        timestamp: 1_090_000,
        latency_ms: 250,
    }];

    let correlated = CommandCorrelator::new(&config).correlate_turns(invocations, &turns);
    assert_eq!(correlated[0].latency_ms, Some(250));
    assert_eq!(correlated[1].latency_ms, None);
}

#[test]
fn test_turn_latency_outside_tolerance() {
    let config = ReconstructionConfig::default().with_turn_match_tolerance_us(1_000);
    let invocations = vec![Invocation::new("lookup", 1_000_000)];
    let turns = vec![TurnMessage {
        name: None,
        timestamp: 1_002_000,
        latency_ms: 80,
    }];

    let correlated = CommandCorrelator::new(&config).correlate_turns(invocations, &turns);
    assert_eq!(correlated[0].latency_ms, None);
}

#[test]
fn test_turn_latency_is_one_to_one() {
    let config = ReconstructionConfig::default();
    let invocations = vec![
        Invocation::new("lookup", 1_000_000),
        Invocation::new("lookup", 2_000_000),
    ];
    let turns = vec![
        TurnMessage {
            name: Some("lookup".to_string()),
            timestamp: 1_000_100,
            latency_ms: 10,
        },
        TurnMessage {
            name: Some("lookup".to_string()),
            timestamp: 1_000_200,
            latency_ms: 20,
        },
    ];

    let correlated = CommandCorrelator::new(&config).correlate_turns(invocations, &turns);
    assert_eq!(correlated[0].latency_ms, Some(10));
    assert_eq!(correlated[1].latency_ms, Some(20));
}
