use super::{CanonicalPass, CanonicalizationReport};
use crate::core::workflow_graph::references::{reference_expression, replace_references};
use crate::core::workflow_graph::schema::{StepType, Workflow, WorkflowStep};

const ITEM_VARIABLE: &str = "item";

/// Rewrites `{{<iterateOver>.<field>}}` inside a loop body to `{{item.<field>}}`.
///
/// Each loop only rewrites its own body; a nested loop's body is handled in
/// its own pass with its own `iterateOver`.
pub struct LoopItemPass;

impl CanonicalPass for LoopItemPass {
    fn name(&self) -> &'static str {
        "loop_items"
    }

    fn apply(&self, mut workflow: Workflow, report: &mut CanonicalizationReport) -> Workflow {
        for step in &mut workflow.workflow_steps {
            report.loop_references_rewritten += rewrite_loops(step);
        }
        workflow
    }
}

fn rewrite_loops(step: &mut WorkflowStep) -> usize {
    let mut rewritten = 0;
    if step.is_type(&StepType::Loop) {
        let array_path = step
            .iterate_over
            .as_deref()
            .map(reference_expression)
            .unwrap_or_default();
        if !array_path.is_empty() {
            for child in step.loop_steps.iter_mut().flatten() {
                rewritten += rewrite_scope(child, &array_path);
            }
        }
    }
    for child in step.children_mut() {
        rewritten += rewrite_loops(child);
    }
    rewritten
}

/// Rewrites one step inside a loop body and the steps it owns, stopping at
/// the body of a nested loop.
fn rewrite_scope(step: &mut WorkflowStep, array_path: &str) -> usize {
    let mut rewritten = 0;
    step.rewrite_own_strings(&mut |text, site| {
        let updated = replace_references(text, site, |id, tail| {
            let expression = format!("{}{}", id, tail);
            let field = expression.strip_prefix(array_path)?.strip_prefix('.')?;
            (!field.is_empty()).then(|| format!("{}.{}", ITEM_VARIABLE, field))
        });
        if let Some(updated) = updated {
            *text = updated;
            rewritten += 1;
        }
    });

    for child in step.steps.iter_mut().flatten() {
        rewritten += rewrite_scope(child, array_path);
    }
    if let Some(scatter) = step.scatter.as_mut() {
        for child in &mut scatter.steps {
            rewritten += rewrite_scope(child, array_path);
        }
    }
    if !step.is_type(&StepType::Loop) {
        for child in step.loop_steps.iter_mut().flatten() {
            rewritten += rewrite_scope(child, array_path);
        }
    }
    rewritten
}
