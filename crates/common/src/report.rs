//! Run aggregation
//!
//! Collects diagnostics from every stage, orders them deterministically and
//! decides the outcome of the run.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;
use crate::model::{Diagnostic, DiagnosticKind, Severity};

/// Thread-safe diagnostic accumulator shared by per-document tasks
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    inner: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.inner.lock().push(diagnostic);
    }

    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.inner.lock().extend(diagnostics);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Take everything collected so far
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.inner.lock())
    }
}

/// Diagnostic counts by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    /// Error-severity diagnostics caused by unreadable paths
    pub io_errors: usize,
}

/// When a run counts as failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    pub fail_on_warnings: bool,
}

/// Classification of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    IoFailure,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Passed => 0,
            Outcome::Failed => 1,
            Outcome::IoFailure => 2,
        }
    }
}

/// Final, sorted result of a validation run
#[derive(Debug, Clone, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
    /// Number of documents that were scanned
    pub documents: usize,
    /// Number of feature directories that were scanned
    pub features: usize,
}

impl Report {
    pub fn new(mut diagnostics: Vec<Diagnostic>, documents: usize, features: usize) -> Self {
        diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Self {
            diagnostics,
            documents,
            features,
        }
    }

    /// Diagnostics ordered by file, line, rule id, then message
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for d in &self.diagnostics {
            match d.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
            if d.kind == DiagnosticKind::IoError {
                summary.io_errors += 1;
            }
        }
        summary
    }

    pub fn outcome(&self, policy: FailurePolicy) -> Outcome {
        let summary = self.summary();
        if summary.io_errors > 0 {
            Outcome::IoFailure
        } else if summary.errors > 0 || (policy.fail_on_warnings && summary.warnings > 0) {
            Outcome::Failed
        } else {
            Outcome::Passed
        }
    }

    /// Group diagnostics by file, keeping the sorted order
    pub fn by_file(&self) -> Vec<(&str, Vec<&Diagnostic>)> {
        let mut groups: Vec<(&str, Vec<&Diagnostic>)> = Vec::new();
        for d in &self.diagnostics {
            if let Some((file, items)) = groups.last_mut() {
                if *file == d.file {
                    items.push(d);
                    continue;
                }
            }
            groups.push((d.file.as_str(), vec![d]));
        }
        groups
    }

    /// Pretty JSON array of `{ file, line, ruleId, severity, message }`
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.diagnostics)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(file: &str, line: Option<usize>, rule: &str, severity: Severity) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::SchemaViolation, severity, rule, file, line, "msg")
    }

    #[test]
    fn test_sink_collects_across_clones() {
        let sink = DiagnosticSink::new();
        let other = sink.clone();
        sink.push(diag("a.mock.md", Some(1), "r", Severity::Error));
        other.extend(vec![diag("b.mock.md", None, "r", Severity::Info)]);
        assert_eq!(sink.len(), 2);
        assert_eq!(other.drain().len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_report_sorted_and_grouped() {
        let report = Report::new(
            vec![
                diag("b.mock.md", Some(2), "x", Severity::Warning),
                diag("a.mock.md", Some(9), "x", Severity::Error),
                diag("a.mock.md", None, "y", Severity::Info),
                diag("a.mock.md", Some(3), "z", Severity::Error),
            ],
            2,
            1,
        );
        let keys: Vec<_> = report.diagnostics().iter().map(|d| (d.file.as_str(), d.line)).collect();
        assert_eq!(
            keys,
            vec![("a.mock.md", None), ("a.mock.md", Some(3)), ("a.mock.md", Some(9)), ("b.mock.md", Some(2))]
        );

        let groups = report.by_file();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1.len(), 3);
    }

    #[test]
    fn test_identical_diagnostics_are_kept() {
        // Two broken placeholders on one line are two anomalies
        let broken = Diagnostic::parse_error(
            "qa/acl/a.mock.md",
            Some(3),
            "placeholder-syntax",
            "screenshot placeholder 'a.png' is missing the '|' separator",
        );
        let report = Report::new(vec![broken.clone(), broken], 1, 1);
        assert_eq!(report.diagnostics().len(), 2);
        assert_eq!(report.summary().errors, 2);
    }

    #[test]
    fn test_outcome_policy() {
        let warnings = Report::new(vec![diag("a.mock.md", Some(1), "x", Severity::Warning)], 1, 1);
        assert_eq!(warnings.outcome(FailurePolicy::default()), Outcome::Passed);
        assert_eq!(
            warnings.outcome(FailurePolicy { fail_on_warnings: true }),
            Outcome::Failed
        );

        let infos = Report::new(vec![diag("a.mock.md", None, "x", Severity::Info)], 1, 1);
        assert_eq!(infos.outcome(FailurePolicy { fail_on_warnings: true }), Outcome::Passed);

        let errors = Report::new(vec![diag("a.mock.md", Some(1), "x", Severity::Error)], 1, 1);
        assert_eq!(errors.outcome(FailurePolicy::default()).exit_code(), 1);
    }

    #[test]
    fn test_io_error_takes_precedence() {
        let report = Report::new(
            vec![
                diag("a.mock.md", Some(1), "x", Severity::Error),
                Diagnostic::io_error("missing", "cannot read path"),
            ],
            1,
            1,
        );
        assert_eq!(report.summary().io_errors, 1);
        assert_eq!(report.outcome(FailurePolicy::default()), Outcome::IoFailure);
        assert_eq!(Outcome::IoFailure.exit_code(), 2);
    }

    #[test]
    fn test_json_field_names() {
        let report = Report::new(vec![diag("a.mock.md", Some(4), "id-format", Severity::Error)], 1, 1);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let record = &value[0];
        assert_eq!(record["file"], "a.mock.md");
        assert_eq!(record["line"], 4);
        assert_eq!(record["ruleId"], "id-format");
        assert_eq!(record["severity"], "error");
        assert!(record.get("kind").is_none());
    }
}
