use agentpilot::core::execution_summary::{
    build_execution_summary, ExecutionSummaryBuilder, ExecutionTrace, StepStatus, SummarySettings,
};
use serde_json::json;

fn trace(value: serde_json::Value) -> ExecutionTrace {
    ExecutionTrace::from_value(&value).expect("valid trace")
}

#[test]
fn zero_appended_rows_gets_a_friendly_message() {
    let results = build_execution_summary(
        &trace(json!([
            {"stepId": "step1", "plugin": "google-sheets", "action": "append_rows",
             "status": "success", "output": {"appended_rows": 0}, "durationMs": 120}
        ])),
        None,
    );

    let step = &results.steps[0];
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.item_count, 0);
    assert_eq!(
        step.message,
        "No new rows added (all items already exist or were filtered out)"
    );
    assert_eq!(results.summary.total_items, 0);
}

#[test]
fn summary_never_contains_output_values() {
    let results = build_execution_summary(
        &trace(json!({"steps": [
            {"stepId": "step1", "plugin": "google-mail", "action": "search_emails", "status": "completed",
             "output": [
                 {"subject": "Salary review for Jordan", "from": "hr@acme.test", "ssn": "123-45-6789"},
                 {"subject": "Lunch", "from": "bob@acme.test", "ssn": "987-65-4321"}
             ]},
            {"stepId": "step2", "plugin": "slack", "action": "send_message", "status": "completed",
             "output": {"channel": "#private-hr", "ts": "1700000000.0001"}}
        ]})),
        Some(&json!({"token": "sk-live-abc", "delivered": true})),
    );

    let serialized = serde_json::to_string(&results).unwrap();
    for secret in ["Salary review", "hr@acme.test", "123-45-6789", "#private-hr", "sk-live-abc"] {
        assert!(!serialized.contains(secret), "leaked {}", secret);
    }
    assert_eq!(results.steps[0].item_count, 2);
    assert_eq!(results.steps[0].sample_keys, vec!["from", "ssn", "subject"]);
    assert_eq!(results.steps[0].message, "Found 2 emails");
    assert_eq!(results.final_output.value_type, "object");
    assert_eq!(results.final_output.sample_keys, vec!["delivered", "token"]);
}

#[test]
fn system_steps_are_invisible() {
    let results = build_execution_summary(
        &trace(json!([
            {"stepId": "__init", "status": "completed", "output": {"count": 50}, "durationMs": 5},
            {"stepId": "step1", "action": "read_range", "status": "completed",
             "output": {"rows": {"type": "array", "count": 8}}, "durationMs": 40},
            {"stepId": "step2", "plugin": "internal", "action": "checkpoint", "status": "completed",
             "output": {"count": 1}, "durationMs": 2},
            {"stepId": "step3", "action": "send_email", "status": "failed", "output": {"error": "quota"}}
        ])),
        None,
    );

    let ids: Vec<&str> = results.steps.iter().map(|step| step.step_id.as_str()).collect();
    assert_eq!(ids, vec!["step1", "step3"]);
    assert_eq!(results.summary.total_steps, 2);
    assert_eq!(results.summary.completed_steps, 1);
    assert_eq!(results.summary.failed_steps, 1);
    assert_eq!(results.summary.total_duration_ms, 40);
    assert_eq!(results.steps[0].message, "Retrieved 8 rows");
    // the last visible step failed, so it reports nothing
    assert_eq!(results.summary.total_items, 0);
    assert_eq!(results.steps[1].message, "Step failed");
}

#[test]
fn sample_keys_respect_the_configured_cap() {
    let builder = ExecutionSummaryBuilder::new(SummarySettings {
        max_sample_keys: 2,
        ..SummarySettings::default()
    });

    let results = builder.build(
        &trace(json!([
            {"stepId": "step1", "action": "get_record", "status": "done",
             "output": {"zeta": 1, "alpha": 2, "mid": 3}}
        ])),
        None,
    );

    assert_eq!(results.steps[0].sample_keys, vec!["alpha", "mid"]);
    assert_eq!(results.steps[0].item_count, 1);
    assert_eq!(results.final_output.value_type, "null");
    assert_eq!(results.final_output.item_count, 0);
}
