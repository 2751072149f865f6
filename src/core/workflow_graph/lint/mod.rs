use crate::core::workflow_graph::schema::WorkflowStep;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod rules;
pub use rules::*;

/// Severity of a pre-flight finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueSeverity::Error => write!(f, "Error"),
            IssueSeverity::Warning => write!(f, "Warning"),
        }
    }
}

/// A single finding emitted by a pre-flight rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub severity: IssueSeverity,
    pub message: String,
    pub location: Option<String>,
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn error(
        code: impl Into<String>,
        message: impl Into<String>,
        location: Option<String>,
        suggestion: Option<&str>,
    ) -> Self {
        Self::new(code, IssueSeverity::Error, message, location, suggestion)
    }

    pub fn warning(
        code: impl Into<String>,
        message: impl Into<String>,
        location: Option<String>,
        suggestion: Option<&str>,
    ) -> Self {
        Self::new(code, IssueSeverity::Warning, message, location, suggestion)
    }

    fn new(
        code: impl Into<String>,
        severity: IssueSeverity,
        message: impl Into<String>,
        location: Option<String>,
        suggestion: Option<&str>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            location,
            suggestion: suggestion.map(str::to_string),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.severity, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " (at {})", location)?;
        }
        Ok(())
    }
}

/// Outcome of a pre-flight check. `valid` holds iff `errors` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl PreflightReport {
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|issue| issue.severity == IssueSeverity::Error);
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn issue_count(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    /// Errors first, then warnings, each in rule order.
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// Trait implemented by pre-flight rules.
pub trait PreflightRule {
    fn check(&self, steps: &[WorkflowStep]) -> Vec<ValidationIssue>;
}

/// Runs the built-in pre-flight rules in order, collecting every finding.
pub struct PreflightValidator {
    rules: Vec<Box<dyn PreflightRule>>,
}

impl PreflightValidator {
    pub fn new() -> Self {
        Self {
            rules: built_in_rules(),
        }
    }

    pub fn run(&self, steps: &[WorkflowStep]) -> PreflightReport {
        let issues: Vec<ValidationIssue> = self
            .rules
            .iter()
            .flat_map(|rule| rule.check(steps))
            .collect();
        let report = PreflightReport::from_issues(issues);
        tracing::debug!(
            steps = steps.len(),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "pre-flight validation finished"
        );
        report
    }
}

impl Default for PreflightValidator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_pre_flight(steps: &[WorkflowStep]) -> PreflightReport {
    PreflightValidator::new().run(steps)
}
