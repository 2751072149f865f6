use agentpilot::core::workflow_graph::{
    canonicalize_value, references::referenced_ids, validate_pre_flight, StepType, Workflow,
};
use serde_json::{json, Value};

fn scatter_with_colliding_children() -> Value {
    json!({
        "workflow_steps": [
            {"id": "step1", "type": "action", "plugin": "google-sheets", "action": "read_range",
             "params": {"location": "Leads!A:F"}},
            {"id": "step2", "type": "transform", "operation": "group", "dependencies": ["step1"],
             "input": "{{step1.data}}", "config": {"group_by": "owner"}},
            {"id": "step3", "type": "transform", "operation": "filter", "dependencies": ["step2"],
             "input": "{{step2.data}}"},
            {"id": "step4", "type": "scatter_gather", "dependencies": ["step3"],
             "scatter": {
                 "input": "{{step3.data.groups}}",
                 "itemVariable": "group",
                 "steps": [
                     {"id": "step5", "type": "ai_processing", "prompt": "Summarize {{group.rows}}"},
                     {"id": "step6", "type": "action", "plugin": "slack", "action": "send_message",
                      "dependencies": ["step5"], "params": {"text": "{{step5.data}}"}}
                 ]
             },
             "gather": {"operation": "collect"}},
            {"id": "step5", "type": "action", "plugin": "google-mail", "action": "send_email",
             "dependencies": ["step4", "step6"], "params": {"body": "{{step6.data}}"}}
        ]
    })
}

fn all_ids(workflow: &Workflow) -> Vec<String> {
    workflow
        .steps()
        .iter()
        .flat_map(|step| std::iter::once(step).chain(step.descendants()))
        .map(|step| step.id.clone())
        .collect()
}

#[test]
fn colliding_nested_ids_are_namespaced_under_their_parent() {
    let (workflow, report) = canonicalize_value(&scatter_with_colliding_children());

    let steps = workflow.steps();
    assert_eq!(steps.len(), 5);
    let nested = &steps[3].scatter.as_ref().unwrap().steps;
    assert_eq!(nested[0].id, "step4_nest1");
    assert_eq!(nested[1].id, "step4_nest2");
    assert_eq!(nested[1].dependencies, vec!["step4_nest1".to_string()]);
    assert_eq!(nested[1].params.as_ref().unwrap()["text"], "{{step4_nest1.data}}");
    assert_eq!(report.nested_ids_renamed, 2);

    let ids = all_ids(&workflow);
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(ids.len(), unique.len(), "ids must be unique across the tree: {:?}", ids);
}

#[test]
fn top_level_references_to_nested_steps_point_at_the_owner() {
    let (workflow, _) = canonicalize_value(&scatter_with_colliding_children());

    let last = workflow.steps().last().unwrap();
    assert_eq!(last.id, "step5");
    assert_eq!(last.dependencies, vec!["step4".to_string()]);
    assert_eq!(last.params.as_ref().unwrap()["body"], "{{step4.data}}");

    let nested_ids: Vec<String> = workflow
        .steps()
        .iter()
        .flat_map(|step| step.descendants())
        .map(|step| step.id.clone())
        .collect();
    for step in workflow.steps() {
        let own = serde_json::to_string(&step.params).unwrap();
        for referenced in referenced_ids(&own) {
            assert!(!nested_ids.contains(&referenced), "{} leaks {}", step.id, referenced);
        }
    }
}

#[test]
fn arbitrary_ids_become_sequential() {
    let input = json!({
        "workflow_steps": [
            {"id": "fetch", "type": "action", "plugin": "google-sheets", "action": "read_range"},
            {"id": "fan_out", "type": "scatter_gather", "dependencies": ["fetch"],
             "scatter": {"input": "fetch.data.rows",
                         "steps": [{"id": "step2", "type": "ai_processing", "prompt": "Tag {{item.title}}"}]}},
            {"id": "notify", "type": "action", "plugin": "slack", "action": "send_message",
             "dependencies": ["fan_out"], "params": {"text": "{{fan_out.data}}"}}
        ]
    });

    let (workflow, report) = canonicalize_value(&input);

    let ids: Vec<&str> = workflow.steps().iter().map(|step| step.id.as_str()).collect();
    assert_eq!(ids, vec!["step1", "step2", "step3"]);
    let scatter = workflow.steps()[1].scatter.as_ref().unwrap();
    assert_eq!(scatter.input.as_deref(), Some("step1.data.rows"));
    assert_eq!(scatter.steps[0].id, "step2_nest1");
    assert_eq!(scatter.item_variable.as_deref(), Some("item"));
    assert_eq!(
        workflow.steps()[1].gather.as_ref().unwrap().operation.as_deref(),
        Some("collect")
    );
    assert_eq!(workflow.steps()[2].dependencies, vec!["step2".to_string()]);
    assert_eq!(workflow.steps()[2].params.as_ref().unwrap()["text"], "{{step2.data}}");
    assert!(report.auto_fixed());
}

#[test]
fn dependencies_that_do_not_run_earlier_are_pruned() {
    let input = json!([
        {"id": "a", "type": "action", "plugin": "http", "action": "get", "dependencies": ["c"]},
        {"id": "b", "type": "transform", "dependencies": ["a", "b", "missing"]},
        {"id": "c", "type": "action", "plugin": "http", "action": "post", "dependencies": ["b", "a"]}
    ]);

    let (workflow, report) = canonicalize_value(&input);

    let steps = workflow.steps();
    assert!(steps[0].dependencies.is_empty());
    assert_eq!(steps[1].dependencies, vec!["step1".to_string()]);
    assert_eq!(steps[2].dependencies, vec!["step2".to_string(), "step1".to_string()]);
    assert_eq!(report.dependencies_dropped, 3);
    assert!(validate_pre_flight(steps).valid);
}

#[test]
fn foreign_fields_are_stripped_and_defaults_filled() {
    let input = json!([
        {"id": "think", "prompt": "Decide", "plugin": "openai", "params": {"x": 1}},
        {"id": "send", "type": "action", "action": "google-mail.send_email", "prompt": "ignored"}
    ]);

    let (workflow, report) = canonicalize_value(&input);

    let think = &workflow.steps()[0];
    assert!(think.is_type(&StepType::AiProcessing));
    assert!(think.plugin.is_none());
    assert!(think.params.is_none());
    assert_eq!(think.name.as_deref(), Some("step1"));
    assert_eq!(think.continue_on_error, Some(false));

    let send = &workflow.steps()[1];
    assert_eq!(send.plugin.as_deref(), Some("google-mail"));
    assert_eq!(send.action.as_deref(), Some("send_email"));
    assert!(send.prompt.is_none());
    assert!(report.stray_fields_removed >= 3);
}

#[test]
fn loop_bodies_read_from_the_item_variable() {
    let input = json!([
        {"id": "rows", "type": "action", "plugin": "google-sheets", "action": "read_range"},
        {"id": "each", "type": "loop", "iterateOver": "{{rows.data.rows}}", "dependencies": ["rows"],
         "loopSteps": [
             {"id": "draft", "type": "ai_processing",
              "prompt": "Write to {{rows.data.rows.name}} about {{rows.data.rows.topic}}; total {{rows.data.count}}"}
         ]}
    ]);

    let (workflow, report) = canonicalize_value(&input);

    let looped = &workflow.steps()[1];
    assert_eq!(looped.iterate_over.as_deref(), Some("{{step1.data.rows}}"));
    let prompt = looped.loop_steps.as_ref().unwrap()[0].prompt.as_deref().unwrap();
    assert_eq!(prompt, "Write to {{item.name}} about {{item.topic}}; total {{step1.data.count}}");
    assert_eq!(report.loop_references_rewritten, 1);
}

#[test]
fn canonicalizing_twice_changes_nothing() {
    let (once, _) = canonicalize_value(&scatter_with_colliding_children());
    let (twice, report) = canonicalize_value(&serde_json::to_value(&once).unwrap());

    assert_eq!(once, twice);
    assert!(!report.auto_fixed(), "{:?}", report);
}

#[test]
fn forward_text_references_survive_but_fail_validation() {
    let input = json!([
        {"id": "step1", "type": "action", "plugin": "slack", "action": "post_message",
         "params": {"text": "{{step2.data}}"}},
        {"id": "step2", "type": "action", "plugin": "google-sheets", "action": "read_range"}
    ]);

    let (workflow, report) = canonicalize_value(&input);

    let steps = workflow.steps();
    assert_eq!(steps[0].params.as_ref().unwrap()["text"], "{{step2.data}}");
    assert_eq!(report.unresolved_references, 1);

    let preflight = validate_pre_flight(steps);
    assert!(!preflight.valid);
    assert_eq!(preflight.errors.len(), 1);
    assert_eq!(preflight.errors[0].code, "WFG-PRE-003");
    assert_eq!(
        preflight.errors[0].message,
        "step 'step1' (position 1) references step 'step2' (position 2), which does not run before it"
    );
}

#[test]
fn references_to_missing_steps_fail_validation() {
    let input = json!([
        {"id": "step1", "type": "action", "plugin": "google-sheets", "action": "read_range"},
        {"id": "step2", "type": "ai_processing", "prompt": "Summarize {{step7.data}} for {{item.owner}}",
         "dependencies": ["step1"]}
    ]);

    let (workflow, report) = canonicalize_value(&input);

    assert_eq!(report.unresolved_references, 1);
    let preflight = validate_pre_flight(workflow.steps());
    assert_eq!(preflight.errors.len(), 1);
    assert_eq!(preflight.errors[0].code, "WFG-PRE-002");
    assert_eq!(preflight.errors[0].message, "step 'step2' references unknown step 'step7'");
}
