//! Step canonicalizer: forces an arbitrary step graph into canonical shape.
//!
//! Five passes run in a fixed order, each relying on the invariants the
//! previous one established:
//!
//! 1. [`NestedIdPass`] gives colliding nested steps `<parent>_nest<n>` ids.
//! 2. [`NestedReferencePass`] points top-level references at nested steps to
//!    the owning ancestor's output.
//! 3. [`RenumberPass`] renames top-level steps to `step1..stepN`.
//! 4. [`FieldDefaultsPass`] fills defaults and strips fields foreign to a type.
//! 5. [`LoopItemPass`] rewrites per-item references inside loop bodies.
//!
//! None of the passes can fail; anything still wrong afterwards is for the
//! pre-flight validator to report.

use crate::core::workflow_graph::schema::Workflow;
use serde::Serialize;

mod fields;
mod loop_items;
mod nested_ids;
mod nested_refs;
mod pipeline;
mod renumber;

pub use fields::FieldDefaultsPass;
pub use loop_items::LoopItemPass;
pub use nested_ids::NestedIdPass;
pub use nested_refs::NestedReferencePass;
pub use pipeline::{canonicalize, canonicalize_value, canonicalize_with_report, default_passes};
pub use renumber::RenumberPass;

/// A single infallible rewrite over a whole workflow.
pub trait CanonicalPass {
    fn name(&self) -> &'static str;
    fn apply(&self, workflow: Workflow, report: &mut CanonicalizationReport) -> Workflow;
}

/// Counts of the repairs made during one canonicalization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalizationReport {
    pub nested_ids_renamed: usize,
    pub nested_references_rewritten: usize,
    pub ids_renumbered: usize,
    pub dependencies_dropped: usize,
    pub defaults_filled: usize,
    pub stray_fields_removed: usize,
    pub loop_references_rewritten: usize,
    /// Textual references left pointing at a later or missing step. These are
    /// not repairs; the pre-flight validator reports them.
    pub unresolved_references: usize,
}

impl CanonicalizationReport {
    /// True when the input needed at least one repair.
    pub fn auto_fixed(&self) -> bool {
        self.repair_count() > 0
    }

    pub fn repair_count(&self) -> usize {
        self.nested_ids_renamed
            + self.nested_references_rewritten
            + self.ids_renumbered
            + self.dependencies_dropped
            + self.defaults_filled
            + self.stray_fields_removed
            + self.loop_references_rewritten
    }
}
