use super::{CanonicalPass, CanonicalizationReport};
use crate::core::workflow_graph::schema::{GatherConfig, ScatterConfig, StepType, Workflow, WorkflowStep};
use serde_json::{Map, Value};

pub(crate) const DEFAULT_ITEM_VARIABLE: &str = "item";
pub(crate) const DEFAULT_GATHER_OPERATION: &str = "collect";

/// Fills per-type defaults and strips fields that do not belong to a type.
pub struct FieldDefaultsPass;

impl CanonicalPass for FieldDefaultsPass {
    fn name(&self) -> &'static str {
        "fields"
    }

    fn apply(&self, mut workflow: Workflow, report: &mut CanonicalizationReport) -> Workflow {
        for step in &mut workflow.workflow_steps {
            normalize_step(step, report);
        }
        workflow
    }
}

fn normalize_step(step: &mut WorkflowStep, report: &mut CanonicalizationReport) {
    fill_common(step, report);
    if step.is_type(&StepType::Action) {
        normalize_action(step, report);
    } else {
        report.stray_fields_removed += take_count(&mut step.plugin)
            + take_count(&mut step.action)
            + take_count(&mut step.params);
    }

    let step_type = step.step_type.clone();
    match step_type {
        Some(StepType::Loop) => {
            if step.iterate_over.is_none() {
                step.iterate_over = Some(String::new());
                report.defaults_filled += 1;
            }
            if step.loop_steps.is_none() {
                step.loop_steps = Some(Vec::new());
                report.defaults_filled += 1;
            }
        }
        Some(StepType::ScatterGather) => normalize_scatter_gather(step, report),
        _ => {}
    }

    for child in step.children_mut() {
        normalize_step(child, report);
    }
}

fn fill_common(step: &mut WorkflowStep, report: &mut CanonicalizationReport) {
    if step.name.as_deref().map_or(true, |name| name.trim().is_empty()) {
        step.name = Some(step.id.clone());
        report.defaults_filled += 1;
    }
    if step.step_type.is_none() {
        step.step_type = Some(StepType::AiProcessing);
        report.defaults_filled += 1;
    }
    if step.description.is_none() {
        step.description = Some(String::new());
        report.defaults_filled += 1;
    }
    if step.continue_on_error.is_none() {
        step.continue_on_error = Some(false);
        report.defaults_filled += 1;
    }
}

fn normalize_action(step: &mut WorkflowStep, report: &mut CanonicalizationReport) {
    if let Some(action) = step.action.as_mut() {
        if let Some((prefix, bare)) = action.rsplit_once('.') {
            let prefix = prefix.to_string();
            *action = bare.to_string();
            if step.plugin.as_deref().map_or(true, |plugin| plugin.trim().is_empty()) {
                step.plugin = Some(prefix);
            }
        }
    }
    if step.plugin.is_none() {
        step.plugin = Some(String::new());
        report.defaults_filled += 1;
    }
    if step.action.is_none() {
        step.action = Some(String::new());
        report.defaults_filled += 1;
    }
    if !matches!(step.params, Some(Value::Object(_))) {
        step.params = Some(Value::Object(Map::new()));
        report.defaults_filled += 1;
    }

    report.stray_fields_removed += take_count(&mut step.prompt)
        + take_count(&mut step.model)
        + take_count(&mut step.operation)
        + take_count(&mut step.condition)
        + take_count(&mut step.iterate_over)
        + take_count(&mut step.loop_steps)
        + take_count(&mut step.steps)
        + take_count(&mut step.scatter)
        + take_count(&mut step.gather);
}

fn normalize_scatter_gather(step: &mut WorkflowStep, report: &mut CanonicalizationReport) {
    let scatter = step.scatter.get_or_insert_with(|| {
        report.defaults_filled += 1;
        ScatterConfig::default()
    });
    if scatter.input.is_none() {
        scatter.input = Some(String::new());
        report.defaults_filled += 1;
    }
    if scatter
        .item_variable
        .as_deref()
        .map_or(true, |var| var.trim().is_empty())
    {
        scatter.item_variable = Some(DEFAULT_ITEM_VARIABLE.to_string());
        report.defaults_filled += 1;
    }

    let gather = step.gather.get_or_insert_with(|| {
        report.defaults_filled += 1;
        GatherConfig::default()
    });
    if gather
        .operation
        .as_deref()
        .map_or(true, |op| op.trim().is_empty())
    {
        gather.operation = Some(DEFAULT_GATHER_OPERATION.to_string());
        report.defaults_filled += 1;
    }
}

fn take_count<T>(field: &mut Option<T>) -> usize {
    usize::from(field.take().is_some())
}
