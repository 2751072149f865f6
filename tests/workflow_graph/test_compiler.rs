use agentpilot::core::workflow_graph::{
    compile, compiler::deterministic_step_percentage, validate_before_compilation, validate_pre_flight,
    CompilerSettings, IrCompiler, LogicalIr, StepType, WorkflowStep,
};
use serde_json::{json, Value};

fn ir(value: Value) -> LogicalIr {
    serde_json::from_value(value).expect("valid IR")
}

fn sheet_to_email() -> Value {
    json!({
        "goal": "Email the weekly sales sheet",
        "data_sources": [
            {"id": "sales", "type": "tabular", "source": "google-sheets", "location": "Sales!A1:F"}
        ],
        "delivery": [
            {"method": "email", "config": {"recipient": "team@acme.test", "subject": "Weekly sales"}}
        ]
    })
}

fn all_steps(steps: &[WorkflowStep]) -> Vec<&WorkflowStep> {
    steps
        .iter()
        .flat_map(|step| std::iter::once(step).chain(step.descendants()))
        .collect()
}

fn assert_canonical(steps: &[WorkflowStep]) {
    for (index, step) in steps.iter().enumerate() {
        assert_eq!(step.id, format!("step{}", index + 1));
        for dependency in &step.dependencies {
            let position = steps
                .iter()
                .position(|candidate| &candidate.id == dependency)
                .unwrap_or_else(|| panic!("{} depends on missing {}", step.id, dependency));
            assert!(position < index, "{} depends on later {}", step.id, dependency);
        }
    }
}

#[test]
fn single_sheet_to_email_uses_simple_rule() {
    let result = compile(&ir(sheet_to_email()));

    assert!(result.success);
    assert_eq!(result.metadata.rule_used.as_deref(), Some("simple"));
    let workflow = result.workflow.expect("workflow");
    let steps = workflow.steps();
    assert_eq!(steps.len(), 2);
    assert_eq!(result.metadata.step_count, 2);

    assert!(steps[0].is_type(&StepType::Action));
    assert_eq!(steps[0].plugin.as_deref(), Some("google-sheets"));
    assert_eq!(steps[0].action.as_deref(), Some("read_range"));

    assert!(steps[1].is_type(&StepType::Action));
    assert_eq!(steps[1].plugin.as_deref(), Some("google-mail"));
    assert_eq!(steps[1].action.as_deref(), Some("send_email"));
    assert_eq!(steps[1].dependencies, vec!["step1".to_string()]);
    assert_eq!(steps[1].params.as_ref().unwrap()["to"], "team@acme.test");

    assert_eq!(workflow.suggested_plugins, vec!["google-sheets", "google-mail"]);
    assert_eq!(result.metadata.deterministic_step_percentage, 100.0);
    assert!(validate_pre_flight(steps).valid);
}

#[test]
fn per_group_emission_uses_scatter_gather() {
    let mut value = sheet_to_email();
    value["grouping"] = json!({"group_by": "owner_email", "emit_per_group": true});
    value["delivery"][0]["config"] = json!({"recipient_source": "owner_email", "subject": "Your leads"});

    let result = compile(&ir(value));

    assert!(result.success);
    assert_eq!(result.metadata.rule_used.as_deref(), Some("grouped_delivery"));
    let workflow = result.workflow.unwrap();
    let scatter = workflow
        .steps()
        .iter()
        .find(|step| step.is_type(&StepType::ScatterGather))
        .expect("scatter_gather step");
    let config = scatter.scatter.as_ref().unwrap();
    assert_eq!(config.item_variable.as_deref(), Some("group"));
    let delivery = config.steps.last().unwrap();
    assert_eq!(delivery.params.as_ref().unwrap()["to"], "{{group.key}}");
    assert!(delivery.id.starts_with(&format!("{}_nest", scatter.id)));
    assert_eq!(
        scatter.gather.as_ref().and_then(|g| g.operation.as_deref()),
        Some("collect")
    );
    assert_canonical(workflow.steps());
}

#[test]
fn single_condition_guards_deliveries() {
    let mut value = sheet_to_email();
    value["conditionals"] = json!([
        {"when": {"field": "total", "operator": "gt", "value": 1000}}
    ]);

    let result = compile(&ir(value));

    assert_eq!(result.metadata.rule_used.as_deref(), Some("conditional_delivery"));
    let workflow = result.workflow.unwrap();
    let guard = workflow.steps().last().unwrap();
    assert!(guard.is_type(&StepType::Conditional));
    assert_eq!(guard.condition.as_ref().unwrap()["operator"], "gt");
    let nested = guard.steps.as_ref().unwrap();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].action.as_deref(), Some("send_email"));
}

#[test]
fn per_item_loop_reads_item_fields() {
    let value = json!({
        "goal": "Summarize every ticket and email the digest",
        "data_sources": [
            {"id": "tickets", "type": "tabular", "source": "google-sheets", "location": "Tickets!A:D"}
        ],
        "ai_operations": [
            {"type": "summarize", "instruction": "Summarize the ticket in one line"}
        ],
        "loops": [
            {"over": "tickets", "item_fields": ["title", "body"], "deliver_per_item": false}
        ],
        "delivery": [{"method": "slack", "config": {"channel": "#support"}}]
    });

    let result = compile(&ir(value));

    assert!(result.success);
    assert_eq!(result.metadata.rule_used.as_deref(), Some("per_item_loop"));
    let workflow = result.workflow.unwrap();
    let steps = workflow.steps();
    let looped = steps.iter().find(|s| s.is_type(&StepType::Loop)).unwrap();
    assert_eq!(looped.iterate_over.as_deref(), Some("{{step1.data.rows}}"));

    let body = looped.loop_steps.as_ref().unwrap();
    let prompt = body[0].prompt.as_deref().unwrap();
    assert!(prompt.contains("title: {{item.title}}"));
    assert!(prompt.contains("body: {{item.body}}"));
    assert_eq!(body[0].id, format!("{}_nest1", looped.id));

    assert_eq!(steps.last().unwrap().plugin.as_deref(), Some("slack"));
    assert!(result.metadata.deterministic_step_percentage < 100.0);
    assert_canonical(steps);
}

#[test]
fn compilation_is_deterministic() {
    let mut value = sheet_to_email();
    value["filters"] = json!([{"field": "region", "operator": "eq", "value": "EMEA"}]);
    value["ai_operations"] = json!([{"type": "summarize", "instruction": "Summarize totals"}]);
    value["rendering"] = json!({"type": "html_table", "columns": ["region", "total"]});
    let ir = ir(value);

    let first = compile(&ir);
    let second = compile(&ir);

    let types = |result: &agentpilot::core::workflow_graph::CompilationResult| -> Vec<String> {
        result
            .workflow
            .as_ref()
            .unwrap()
            .steps()
            .iter()
            .map(|step| step.type_tag().to_string())
            .collect()
    };
    assert_eq!(first.metadata.rule_used, second.metadata.rule_used);
    assert_eq!(first.metadata.step_count, second.metadata.step_count);
    assert_eq!(types(&first), types(&second));
    assert_eq!(first.workflow, second.workflow);
}

#[test]
fn unsupported_intent_is_reported_not_thrown() {
    let mut value = sheet_to_email();
    value["loops"] = json!([{"over": "sales"}, {"over": "sales"}]);

    let result = compile(&ir(value));

    assert!(!result.success);
    assert!(result.workflow.is_none());
    let errors = result.errors.unwrap();
    assert!(errors.iter().any(|e| e.contains("2 loops found")));
    assert!(errors
        .iter()
        .any(|e| e.starts_with("No compilation rule supports this combination of IR features")));

    let empty = compile(&LogicalIr::default());
    assert!(!empty.success);
    assert!(empty.errors.unwrap().iter().any(|e| e.contains("an empty IR")));
}

#[test]
fn pre_compilation_check_lists_every_gap() {
    let check = validate_before_compilation(&LogicalIr::default());
    assert!(!check.valid);
    assert_eq!(check.errors.len(), 2);

    assert!(validate_before_compilation(&ir(sheet_to_email())).valid);
}

#[test]
fn every_rule_output_is_canonical_and_valid() {
    let mut grouped = sheet_to_email();
    grouped["grouping"] = json!({"group_by": "owner", "emit_per_group": true});
    grouped["delivery"][0]["config"] = json!({"recipient_source": "owner_email"});
    grouped["rendering"] = json!({"type": "html_table", "columns": []});
    grouped["ai_operations"] = json!([{"type": "classify", "instruction": "Tag priority"}]);

    let compiler = IrCompiler::new(CompilerSettings::default());
    for value in [sheet_to_email(), grouped] {
        let result = compiler.compile(&ir(value));
        let workflow = result.workflow.unwrap();
        assert_canonical(workflow.steps());
        let report = validate_pre_flight(workflow.steps());
        assert!(report.valid, "{:?}", report.errors);
        assert_eq!(
            result.metadata.deterministic_step_percentage,
            deterministic_step_percentage(workflow.steps())
        );
        for step in all_steps(workflow.steps()) {
            assert!(step.name.is_some());
        }
    }
}

#[test]
fn every_data_source_feeds_the_pipeline() {
    let result = compile(&ir(json!({
        "data_sources": [
            {"id": "sales", "type": "tabular", "source": "google-sheets", "location": "Sales!A:F"},
            {"id": "deals", "type": "crm", "source": "hubspot", "location": "deals"}
        ],
        "ai_operations": [{"type": "summarize", "instruction": "Summarize pipeline health"}],
        "delivery": [{"method": "email", "config": {"recipient": "cro@acme.test"}}]
    })));

    assert!(result.success);
    assert_eq!(result.metadata.rule_used.as_deref(), Some("simple"));
    let workflow = result.workflow.unwrap();
    let steps = workflow.steps();
    assert_canonical(steps);
    assert_eq!(steps.len(), 5);

    let merge = &steps[2];
    assert_eq!(merge.operation.as_deref(), Some("merge"));
    assert_eq!(merge.dependencies, vec!["step1".to_string(), "step2".to_string()]);
    assert_eq!(
        merge.config.as_ref().unwrap()["inputs"],
        json!(["{{step1.data}}", "{{step2.data}}"])
    );
    assert_eq!(steps[3].input.as_deref(), Some("{{step3.data}}"));
    assert_eq!(steps[4].params.as_ref().unwrap()["content"], "{{step4.data}}");
    assert!(validate_pre_flight(steps).valid);
}

#[test]
fn every_data_source_reaches_the_delivery_without_processing() {
    let mut value = sheet_to_email();
    value["data_sources"]
        .as_array_mut()
        .unwrap()
        .push(json!({"id": "targets", "type": "tabular", "source": "google-sheets", "location": "Targets!A:C"}));

    let result = compile(&ir(value));

    let workflow = result.workflow.unwrap();
    let steps = workflow.steps();
    assert_canonical(steps);
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[2].dependencies, vec!["step1".to_string(), "step2".to_string()]);
    assert_eq!(steps[3].dependencies, vec!["step3".to_string()]);
    assert_eq!(steps[3].params.as_ref().unwrap()["content"], "{{step3.data}}");
}
