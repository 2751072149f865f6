use super::{CanonicalPass, CanonicalizationReport};
use crate::core::workflow_graph::references::{rename_in_step_own, rename_in_step_tree};
use crate::core::workflow_graph::schema::{Workflow, WorkflowStep};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn sequential_id_regex() -> &'static Regex {
    static SEQUENTIAL: OnceLock<Regex> = OnceLock::new();
    SEQUENTIAL.get_or_init(|| Regex::new(r"^step\d+$").expect("sequential id pattern is valid"))
}

/// Renames nested steps whose ids clash with the top-level id space.
///
/// A nested id is replaced by `<parentId>_nest<n>` when it is blank, equals a
/// top-level id, has the `stepN` shape reserved for top-level steps, or was
/// already used by another nested step.
pub struct NestedIdPass;

impl CanonicalPass for NestedIdPass {
    fn name(&self) -> &'static str {
        "nested_ids"
    }

    fn apply(&self, mut workflow: Workflow, report: &mut CanonicalizationReport) -> Workflow {
        let top_ids: HashSet<String> = workflow
            .workflow_steps
            .iter()
            .map(|step| step.id.clone())
            .collect();
        let mut seen = HashSet::new();

        let mut subtree_renames = Vec::with_capacity(workflow.workflow_steps.len());
        for step in &mut workflow.workflow_steps {
            let mut renames = Vec::new();
            resolve_children(step, &top_ids, &mut seen, &mut renames);
            report.nested_ids_renamed += renames.len();
            subtree_renames.push(renames);
        }

        let all: Vec<&(String, String)> = subtree_renames.iter().flatten().collect();
        if all.is_empty() {
            return workflow;
        }
        let global = unambiguous_map(all.iter().copied(), |old| !top_ids.contains(old));

        for (step, renames) in workflow.workflow_steps.iter_mut().zip(&subtree_renames) {
            rename_in_step_own(step, &global);
            let mut scoped = global.clone();
            scoped.extend(unambiguous_map(renames.iter(), |_| true));
            for child in step.children_mut() {
                rename_in_step_tree(child, &scoped);
            }
        }
        workflow
    }
}

fn resolve_children(
    parent: &mut WorkflowStep,
    top_ids: &HashSet<String>,
    seen: &mut HashSet<String>,
    renames: &mut Vec<(String, String)>,
) {
    let parent_id = parent.id.clone();
    let mut counter = 0;
    for child in parent.children_mut() {
        let collides = child.id.trim().is_empty()
            || top_ids.contains(&child.id)
            || sequential_id_regex().is_match(&child.id)
            || seen.contains(&child.id);
        if collides {
            let fresh = loop {
                counter += 1;
                let candidate = format!("{}_nest{}", parent_id, counter);
                if !top_ids.contains(&candidate) && !seen.contains(&candidate) {
                    break candidate;
                }
            };
            tracing::debug!(old_id = %child.id, new_id = %fresh, "renaming nested step");
            let old = std::mem::replace(&mut child.id, fresh);
            renames.push((old, child.id.clone()));
        }
        seen.insert(child.id.clone());
        resolve_children(child, top_ids, seen, renames);
    }
}

/// Builds an old -> new map. Blank ids and ids renamed more than once are left
/// out since a reference to them cannot be attributed to a single step.
fn unambiguous_map<'a>(
    renames: impl Iterator<Item = &'a (String, String)>,
    keep: impl Fn(&str) -> bool,
) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    let mut ambiguous = HashSet::new();
    for (old, new) in renames {
        if old.trim().is_empty() || !keep(old.as_str()) {
            continue;
        }
        if map.insert(old.clone(), new.clone()).is_some() {
            ambiguous.insert(old.clone());
        }
    }
    map.retain(|old, _| !ambiguous.contains(old));
    map
}
