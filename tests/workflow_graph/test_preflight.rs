use agentpilot::core::workflow_graph::{validate_pre_flight, IssueSeverity, Workflow, WorkflowStep};
use serde_json::{json, Value};

fn steps(value: Value) -> Vec<WorkflowStep> {
    Workflow::from_value_lenient(&value).workflow_steps
}

fn codes(report: &agentpilot::core::workflow_graph::PreflightReport) -> Vec<&str> {
    report.errors.iter().map(|issue| issue.code.as_str()).collect()
}

#[test]
fn forward_dependency_names_both_steps_and_positions() {
    let report = validate_pre_flight(&steps(json!([
        {"id": "step1", "type": "action", "plugin": "google-sheets", "action": "read_range"},
        {"id": "step2", "type": "transform", "dependencies": ["step3"]},
        {"id": "step3", "type": "transform", "dependencies": ["step1"]}
    ])));

    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    let issue = &report.errors[0];
    assert_eq!(issue.code, "WFG-PRE-003");
    assert_eq!(
        issue.message,
        "step 'step2' (position 2) depends on step 'step3' (position 3), which does not run before it"
    );
    assert_eq!(issue.location.as_deref(), Some("step2"));
    insta::assert_snapshot!(
        issue.to_string(),
        @"[WFG-PRE-003] Error: step 'step2' (position 2) depends on step 'step3' (position 3), which does not run before it (at step2)"
    );
}

#[test]
fn every_problem_is_reported_in_one_pass() {
    let report = validate_pre_flight(&steps(json!([
        {"id": "a", "type": "transform", "dependencies": ["b"]},
        {"id": "b", "type": "transform", "dependencies": ["a"]},
        {"id": "send", "type": "action", "action": "post"},
        {"id": "send", "type": "custom_magic"},
        {"id": "c", "type": "transform", "dependencies": ["ghost"]}
    ])));

    assert!(!report.valid);
    let mut found = codes(&report);
    found.sort();
    assert_eq!(
        found,
        vec!["WFG-PRE-001", "WFG-PRE-002", "WFG-PRE-003", "WFG-PRE-004", "WFG-PRE-006"]
    );

    let messages: Vec<&str> = report.errors.iter().map(|issue| issue.message.as_str()).collect();
    assert!(messages.contains(&"duplicate step id 'send' at position 4 (first defined at position 3)"));
    assert!(messages.contains(&"step 'c' depends on unknown step 'ghost'"));
    assert!(messages.contains(&"dependency cycle detected: a -> b -> a"));
    assert!(messages.contains(&"action step 'send' is missing 'plugin'"));

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].severity, IssueSeverity::Warning);
    assert_eq!(report.warnings[0].message, "step 'send' has unknown type 'custom_magic'");
}

#[test]
fn nested_action_fields_are_checked_with_a_path() {
    let report = validate_pre_flight(&steps(json!([
        {"id": "step1", "type": "action", "plugin": "google-sheets", "action": "read_range"},
        {"id": "step2", "type": "loop", "iterateOver": "{{step1.data.rows}}", "dependencies": ["step1"],
         "loopSteps": [{"id": "step2_nest1", "type": "action", "plugin": "slack"}]}
    ])));

    assert_eq!(codes(&report), vec!["WFG-PRE-006"]);
    assert_eq!(report.errors[0].message, "action step 'step2 > step2_nest1' is missing 'action'");
}

#[test]
fn missing_type_is_a_warning_only() {
    let report = validate_pre_flight(&steps(json!([
        {"id": "step1", "prompt": "Summarize"}
    ])));

    assert!(report.valid);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].code, "WFG-PRE-005");
}

#[test]
fn empty_workflow_is_valid() {
    let report = validate_pre_flight(&[]);
    assert!(report.valid);
    assert_eq!(report.issue_count(), 0);
}
