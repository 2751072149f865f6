use agentpilot::core::workflow_graph::{
    compile_to_envelope, envelope_from_value, CompilerSettings, LogicalIr,
};
use serde_json::json;

fn ir(value: serde_json::Value) -> LogicalIr {
    serde_json::from_value(value).expect("valid IR")
}

#[test]
fn successful_compilation_fills_both_step_arrays() {
    let settings = CompilerSettings {
        default_ai_model: Some("gpt-4o-mini".to_string()),
        ..CompilerSettings::default()
    };
    let envelope = compile_to_envelope(
        &ir(json!({
            "goal": "Weekly digest",
            "data_sources": [{"id": "crm", "type": "tabular", "source": "google-sheets", "location": "Deals"}],
            "ai_operations": [{"type": "summarize", "instruction": "Summarize open deals"}],
            "delivery": [{"method": "slack", "config": {"channel": "#sales"}}]
        })),
        &settings,
    );

    assert!(envelope.success);
    assert!(envelope.error.is_none());
    assert_eq!(envelope.method.as_deref(), Some("rule_based:simple"));
    assert_eq!(envelope.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(envelope.workflow.workflow_steps.len(), 3);
    assert_eq!(envelope.workflow.workflow_steps, envelope.workflow.workflow);
    assert_eq!(
        envelope.services_used,
        Some(vec!["google-sheets".to_string(), "slack".to_string()])
    );
    assert!(envelope.validation.valid);
    assert!(!envelope.validation.auto_fixed);

    let value = serde_json::to_value(&envelope).unwrap();
    assert_eq!(value["workflow"]["goal"], "Weekly digest");
    assert_eq!(value["workflow"]["rule_used"], "simple");
    assert_eq!(value["workflow"]["workflow_steps"][1]["model"], "gpt-4o-mini");
}

#[test]
fn failed_compilation_still_has_empty_arrays() {
    let envelope = compile_to_envelope(&LogicalIr::default(), &CompilerSettings::default());

    assert!(!envelope.success);
    let error = envelope.error.as_deref().unwrap();
    assert!(error.contains("IR has no data sources"));

    let value = serde_json::to_value(&envelope).unwrap();
    assert_eq!(value["workflow"]["workflow_steps"], json!([]));
    assert_eq!(value["workflow"]["workflow"], json!([]));
    assert!(value["debug"]["errors"].as_array().unwrap().len() >= 2);
}

#[test]
fn untrusted_graph_reports_remaining_issues() {
    let envelope = envelope_from_value(&json!({"workflow": [
        {"id": "read", "type": "action", "plugin": "google-sheets", "action": "read_range"},
        {"id": "post", "type": "action", "action": "", "dependencies": ["read"]},
        {"id": "odd", "type": "teleport"}
    ]}));

    assert!(envelope.success);
    assert!(!envelope.validation.valid);
    assert_eq!(envelope.validation.issue_count, envelope.validation.issues.len());
    let codes: Vec<&str> = envelope
        .validation
        .issues
        .iter()
        .map(|issue| issue.code.as_str())
        .collect();
    assert!(codes.contains(&"WFG-PRE-006"));
    assert!(codes.contains(&"WFG-PRE-005"));
    assert_eq!(envelope.method.as_deref(), Some("canonicalized"));
}

#[test]
fn envelope_parses_back() {
    let envelope = envelope_from_value(&json!([
        {"id": "x", "type": "action", "plugin": "http", "action": "get"}
    ]));
    let text = serde_json::to_string(&envelope).unwrap();
    let parsed: agentpilot::core::workflow_graph::CompiledWorkflowEnvelope =
        serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, envelope);
}
