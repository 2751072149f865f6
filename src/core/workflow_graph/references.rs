//! Step reference grammar and the string-leaf walker shared by every
//! rewriting pass.
//!
//! A template reference looks like `{{step3.data.rows}}`. Reference-valued
//! fields (`iterateOver`, `scatter.input`, `input`) may also hold the bare form
//! `step3.data.rows`.

use crate::core::workflow_graph::schema::{GatherConfig, ScatterConfig, WorkflowStep};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Where a visited string lives, which decides which reference forms apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSite {
    /// Free text that may embed `{{…}}` references.
    Template,
    /// A field whose whole value is a reference, templated or bare.
    Reference,
}

fn template_regex() -> &'static Regex {
    static TEMPLATE: OnceLock<Regex> = OnceLock::new();
    TEMPLATE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_-]*)((?:[.\[][^{}]*?)?)\s*\}\}")
            .expect("template reference pattern is valid")
    })
}

fn bare_regex() -> &'static Regex {
    static BARE: OnceLock<Regex> = OnceLock::new();
    BARE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_-]*)((?:[.\[][^{}\s]*)?)\s*$")
            .expect("bare reference pattern is valid")
    })
}

fn step_id_regex() -> &'static Regex {
    static STEP_ID: OnceLock<Regex> = OnceLock::new();
    STEP_ID.get_or_init(|| Regex::new(r"^step\d+(?:_nest\d+)*$").expect("step id pattern is valid"))
}

/// True for ids in generated form (`step3`, `step3_nest1`). Runtime variables
/// such as `item` or `group` never match.
pub fn looks_like_step_id(id: &str) -> bool {
    step_id_regex().is_match(id)
}

/// Step ids referenced by `{{…}}` templates in `text`, in order of appearance.
pub fn referenced_ids(text: &str) -> Vec<String> {
    template_regex()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Strip template braces and surrounding whitespace from a reference expression.
pub fn reference_expression(text: &str) -> String {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .unwrap_or(trimmed);
    inner.trim().to_string()
}

/// Replace every `{{id tail}}` for which `replace(id, tail)` yields a new inner
/// expression. Replacement is simultaneous, so chained renames never cascade.
pub fn replace_template_references<F>(text: &str, mut replace: F) -> Option<String>
where
    F: FnMut(&str, &str) -> Option<String>,
{
    if !text.contains("{{") {
        return None;
    }
    let mut changed = false;
    let rewritten = template_regex().replace_all(text, |caps: &Captures| {
        match replace(&caps[1], &caps[2]) {
            Some(inner) => {
                changed = true;
                format!("{{{{{}}}}}", inner)
            }
            None => caps[0].to_string(),
        }
    });
    changed.then(|| rewritten.into_owned())
}

/// Rewrite a string visited at `site`. Template references are handled at
/// every site; the bare `id.path` form only at reference sites.
pub fn replace_references<F>(text: &str, site: TextSite, mut replace: F) -> Option<String>
where
    F: FnMut(&str, &str) -> Option<String>,
{
    if text.contains("{{") {
        return replace_template_references(text, replace);
    }
    if site == TextSite::Reference {
        let caps = bare_regex().captures(text)?;
        return replace(&caps[1], &caps[2]);
    }
    None
}

/// Rename step ids inside references according to `mapping`, keeping the path.
pub fn rename_references(text: &str, site: TextSite, mapping: &HashMap<String, String>) -> Option<String> {
    replace_references(text, site, |id, tail| {
        mapping
            .get(id)
            .filter(|new_id| new_id.as_str() != id)
            .map(|new_id| format!("{}{}", new_id, tail))
    })
}

/// Visits every string leaf of a structurally recursive value.
pub trait RewriteStrings {
    fn rewrite_strings(&mut self, rewrite: &mut dyn FnMut(&mut String, TextSite));
}

impl RewriteStrings for String {
    fn rewrite_strings(&mut self, rewrite: &mut dyn FnMut(&mut String, TextSite)) {
        rewrite(self, TextSite::Template);
    }
}

impl RewriteStrings for Value {
    fn rewrite_strings(&mut self, rewrite: &mut dyn FnMut(&mut String, TextSite)) {
        match self {
            Value::String(text) => rewrite(text, TextSite::Template),
            Value::Array(items) => {
                for item in items {
                    item.rewrite_strings(rewrite);
                }
            }
            Value::Object(map) => map.rewrite_strings(rewrite),
            _ => {}
        }
    }
}

impl RewriteStrings for Map<String, Value> {
    fn rewrite_strings(&mut self, rewrite: &mut dyn FnMut(&mut String, TextSite)) {
        for value in self.values_mut() {
            value.rewrite_strings(rewrite);
        }
    }
}

impl<T: RewriteStrings> RewriteStrings for Option<T> {
    fn rewrite_strings(&mut self, rewrite: &mut dyn FnMut(&mut String, TextSite)) {
        if let Some(inner) = self {
            inner.rewrite_strings(rewrite);
        }
    }
}

impl<T: RewriteStrings> RewriteStrings for Vec<T> {
    fn rewrite_strings(&mut self, rewrite: &mut dyn FnMut(&mut String, TextSite)) {
        for item in self {
            item.rewrite_strings(rewrite);
        }
    }
}

impl RewriteStrings for GatherConfig {
    fn rewrite_strings(&mut self, rewrite: &mut dyn FnMut(&mut String, TextSite)) {
        self.extra.rewrite_strings(rewrite);
    }
}

impl WorkflowStep {
    /// Visit the string leaves owned by this step itself, not by its children.
    pub fn rewrite_own_strings(&mut self, rewrite: &mut dyn FnMut(&mut String, TextSite)) {
        self.description.rewrite_strings(rewrite);
        self.params.rewrite_strings(rewrite);
        self.prompt.rewrite_strings(rewrite);
        self.config.rewrite_strings(rewrite);
        self.condition.rewrite_strings(rewrite);
        self.extra.rewrite_strings(rewrite);
        self.gather.rewrite_strings(rewrite);
        if let Some(input) = self.input.as_mut() {
            rewrite(input, TextSite::Reference);
        }
        if let Some(iterate_over) = self.iterate_over.as_mut() {
            rewrite(iterate_over, TextSite::Reference);
        }
        if let Some(scatter) = self.scatter.as_mut() {
            scatter_own_strings(scatter, rewrite);
        }
    }

    /// Apply `rewrite` to every dependency entry of this step only.
    pub fn rewrite_own_dependencies(&mut self, rewrite: &mut dyn FnMut(&str) -> Option<String>) {
        for dependency in &mut self.dependencies {
            if let Some(replacement) = rewrite(dependency) {
                *dependency = replacement;
            }
        }
    }

    /// Apply `rewrite` to the dependency entries of this step and every descendant.
    pub fn rewrite_all_dependencies(&mut self, rewrite: &mut dyn FnMut(&str) -> Option<String>) {
        self.rewrite_own_dependencies(rewrite);
        for child in self.children_mut() {
            child.rewrite_all_dependencies(rewrite);
        }
    }
}

fn scatter_own_strings(scatter: &mut ScatterConfig, rewrite: &mut dyn FnMut(&mut String, TextSite)) {
    if let Some(input) = scatter.input.as_mut() {
        rewrite(input, TextSite::Reference);
    }
    scatter.extra.rewrite_strings(rewrite);
}

impl RewriteStrings for WorkflowStep {
    fn rewrite_strings(&mut self, rewrite: &mut dyn FnMut(&mut String, TextSite)) {
        self.rewrite_own_strings(rewrite);
        for child in self.children_mut() {
            child.rewrite_strings(rewrite);
        }
    }
}

/// Distinct ids referenced from the strings `step` owns, in order of
/// appearance. Nested steps are not visited.
pub fn own_reference_ids(step: &WorkflowStep) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    step.clone().rewrite_own_strings(&mut |text, site| {
        replace_references(text, site, |id, _| {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
            None
        });
    });
    ids
}

/// Rename ids in every textual reference and dependency entry of `step`,
/// recursing into nested steps. Returns the number of edits made.
pub fn rename_in_step_tree(step: &mut WorkflowStep, mapping: &HashMap<String, String>) -> usize {
    if mapping.is_empty() {
        return 0;
    }
    let mut edits = 0;
    step.rewrite_strings(&mut |text, site| {
        if let Some(updated) = rename_references(text, site, mapping) {
            *text = updated;
            edits += 1;
        }
    });
    step.rewrite_all_dependencies(&mut |dependency| {
        let renamed = mapping.get(dependency).filter(|new_id| *new_id != dependency)?;
        edits += 1;
        Some(renamed.clone())
    });
    edits
}

/// Like [`rename_in_step_tree`] but leaves nested steps untouched.
pub fn rename_in_step_own(step: &mut WorkflowStep, mapping: &HashMap<String, String>) -> usize {
    if mapping.is_empty() {
        return 0;
    }
    let mut edits = 0;
    step.rewrite_own_strings(&mut |text, site| {
        if let Some(updated) = rename_references(text, site, mapping) {
            *text = updated;
            edits += 1;
        }
    });
    step.rewrite_own_dependencies(&mut |dependency| {
        let renamed = mapping.get(dependency).filter(|new_id| *new_id != dependency)?;
        edits += 1;
        Some(renamed.clone())
    });
    edits
}
