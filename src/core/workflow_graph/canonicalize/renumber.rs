use super::{CanonicalPass, CanonicalizationReport};
use crate::core::workflow_graph::references::{looks_like_step_id, own_reference_ids, rename_in_step_tree};
use crate::core::workflow_graph::schema::{Workflow, WorkflowStep};
use std::collections::{HashMap, HashSet};

/// Renames top-level steps to `step1..stepN` and rewrites every reference.
///
/// Synthetic nested ids (`<old>_nest…`) move with their parent. Afterwards any
/// top-level dependency that is dangling, self or forward is dropped so the
/// result is ordered by construction. Textual references cannot be dropped
/// without losing data, so those are only counted and logged.
pub struct RenumberPass;

impl CanonicalPass for RenumberPass {
    fn name(&self) -> &'static str {
        "renumber"
    }

    fn apply(&self, mut workflow: Workflow, report: &mut CanonicalizationReport) -> Workflow {
        let mut mapping: HashMap<String, String> = HashMap::new();
        for (index, step) in workflow.workflow_steps.iter().enumerate() {
            let canonical = canonical_id(index);
            if step.id != canonical {
                report.ids_renumbered += 1;
            }
            if !step.id.is_empty() {
                mapping.entry(step.id.clone()).or_insert(canonical);
            }
        }

        for (index, step) in workflow.workflow_steps.iter_mut().enumerate() {
            let canonical = canonical_id(index);
            if step.id != canonical {
                let old_prefix = format!("{}_nest", step.id);
                let new_prefix = format!("{}_nest", canonical);
                step.for_each_descendant_mut(&mut |nested| {
                    if let Some(rest) = nested.id.strip_prefix(&old_prefix) {
                        let moved = format!("{}{}", new_prefix, rest);
                        mapping
                            .entry(nested.id.clone())
                            .or_insert_with(|| moved.clone());
                        nested.id = moved;
                    }
                });
                step.id = canonical;
            }
        }

        for step in &mut workflow.workflow_steps {
            rename_in_step_tree(step, &mapping);
        }

        for (index, step) in workflow.workflow_steps.iter_mut().enumerate() {
            report.dependencies_dropped += prune_dependencies(step, index);
            report.unresolved_references += count_unresolved_references(step, index);
        }
        workflow
    }
}

pub(crate) fn canonical_id(index: usize) -> String {
    format!("step{}", index + 1)
}

/// Keeps only dependencies on strictly earlier top-level steps, deduplicated.
fn prune_dependencies(step: &mut WorkflowStep, index: usize) -> usize {
    let earlier: HashSet<String> = (0..index).map(canonical_id).collect();
    let mut kept: Vec<String> = Vec::with_capacity(step.dependencies.len());
    let mut dropped = 0;
    for dependency in step.dependencies.drain(..) {
        if kept.contains(&dependency) {
            continue;
        }
        if earlier.contains(&dependency) {
            kept.push(dependency);
        } else {
            tracing::warn!(
                step_id = %step.id,
                dependency = %dependency,
                "dropping dependency that does not name an earlier step"
            );
            dropped += 1;
        }
    }
    step.dependencies = kept;
    dropped
}

/// Step-shaped `{{…}}` references in the step's own fields that do not name
/// an earlier top-level step.
fn count_unresolved_references(step: &WorkflowStep, index: usize) -> usize {
    let earlier: HashSet<String> = (0..index).map(canonical_id).collect();
    let mut unresolved = 0;
    for reference in own_reference_ids(step) {
        if looks_like_step_id(&reference) && !earlier.contains(&reference) {
            tracing::warn!(
                step_id = %step.id,
                reference = %reference,
                "reference does not name an earlier step"
            );
            unresolved += 1;
        }
    }
    unresolved
}
