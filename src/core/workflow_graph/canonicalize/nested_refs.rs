use super::{CanonicalPass, CanonicalizationReport};
use crate::core::workflow_graph::references::replace_references;
use crate::core::workflow_graph::schema::Workflow;
use std::collections::{HashMap, HashSet};

/// Redirects top-level references at nested steps to the owning top-level
/// ancestor's aggregated output (`{{ancestor.data}}`).
///
/// References made from inside nested steps are left alone; siblings in the
/// same scope may address each other.
pub struct NestedReferencePass;

impl CanonicalPass for NestedReferencePass {
    fn name(&self) -> &'static str {
        "nested_refs"
    }

    fn apply(&self, mut workflow: Workflow, report: &mut CanonicalizationReport) -> Workflow {
        let top_ids: HashSet<String> = workflow
            .workflow_steps
            .iter()
            .map(|step| step.id.clone())
            .collect();

        let mut owners: HashMap<String, String> = HashMap::new();
        for step in &workflow.workflow_steps {
            for nested in step.descendants() {
                if nested.id.is_empty() || top_ids.contains(&nested.id) {
                    continue;
                }
                owners.entry(nested.id.clone()).or_insert_with(|| step.id.clone());
            }
        }
        if owners.is_empty() {
            return workflow;
        }

        for step in &mut workflow.workflow_steps {
            let mut rewritten = 0;
            step.rewrite_own_strings(&mut |text, site| {
                let updated = replace_references(text, site, |id, _tail| {
                    owners.get(id).map(|owner| format!("{}.data", owner))
                });
                if let Some(updated) = updated {
                    *text = updated;
                    rewritten += 1;
                }
            });

            let mut dependencies = Vec::with_capacity(step.dependencies.len());
            for dependency in step.dependencies.drain(..) {
                let resolved = match owners.get(&dependency) {
                    Some(owner) => {
                        rewritten += 1;
                        owner.clone()
                    }
                    None => dependency,
                };
                if resolved != step.id && !dependencies.contains(&resolved) {
                    dependencies.push(resolved);
                }
            }
            step.dependencies = dependencies;

            if rewritten > 0 {
                tracing::debug!(step_id = %step.id, rewritten, "redirected nested references");
            }
            report.nested_references_rewritten += rewritten;
        }
        workflow
    }
}
