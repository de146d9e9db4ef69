//! Document model and diagnostics
//!
//! Parsed documents are read-only snapshots built fresh for every run.
//! Line numbers are 1-based and refer to the source text of the document.

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Diagnostics
// ============================================================================

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage of a run produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagnosticKind {
    /// Malformed document structure
    ParseError,
    /// A rule from the rule set was broken
    #[default]
    SchemaViolation,
    /// Cross-document problem found after all documents were parsed
    ConsistencyError,
    /// A path could not be read
    IoError,
}

/// One reported anomaly.
///
/// Field order is the serialized record order consumed by CI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: Option<usize>,
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip)]
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        severity: Severity,
        rule_id: impl Into<String>,
        file: impl Into<String>,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            kind,
        }
    }

    /// Structural problem in a document; always error severity
    pub fn parse_error(
        file: impl Into<String>,
        line: Option<usize>,
        rule_id: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::new(DiagnosticKind::ParseError, Severity::Error, rule_id, file, line, message)
    }

    /// Unreadable path; always error severity
    pub fn io_error(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::IoError, Severity::Error, "io-error", file, None, message)
    }

    /// Ordering used by the reporter: file, line, rule id, then message
    pub fn sort_key(&self) -> (&str, Option<usize>, &str, &str) {
        (&self.file, self.line, &self.rule_id, &self.message)
    }
}

/// Render a path the same way on every platform
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// ============================================================================
// Document model
// ============================================================================

/// Whether a document runs against simulated or live backend services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Mock,
    Full,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Mock => "mock",
            Mode::Full => "full",
        }
    }

    pub fn opposite(&self) -> Mode {
        match self {
            Mode::Mock => Mode::Full,
            Mode::Full => Mode::Mock,
        }
    }

    /// Infer the mode from a `<name>.mock.md` / `<name>.full.md` file name
    pub fn from_file_name(name: &str) -> Option<Mode> {
        if name.ends_with(".mock.md") {
            Some(Mode::Mock)
        } else if name.ends_with(".full.md") {
            Some(Mode::Full)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Mode> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Mode::from_file_name)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognized section headings, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Section {
    Prerequisites,
    SetupScripts,
    StartingUrl,
    TestSteps,
    ExpectedUiState,
    ExpectedResult,
    Screenshots,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Prerequisites,
        Section::SetupScripts,
        Section::StartingUrl,
        Section::TestSteps,
        Section::ExpectedUiState,
        Section::ExpectedResult,
        Section::Screenshots,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Section::Prerequisites => "Prerequisites",
            Section::SetupScripts => "Setup Scripts",
            Section::StartingUrl => "Starting URL",
            Section::TestSteps => "Test Steps",
            Section::ExpectedUiState => "Expected UI State",
            Section::ExpectedResult => "Expected Result",
            Section::Screenshots => "Screenshots",
        }
    }

    /// Exact, case-sensitive label match
    pub fn from_label(label: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.label() == label)
    }

    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Section::Prerequisites
                | Section::TestSteps
                | Section::ExpectedUiState
                | Section::ExpectedResult
        )
    }

    /// Position in the canonical order
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Expected UI state marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Present,
    Absent,
}

/// A parsed test-script document
#[derive(Debug, Clone, Serialize)]
pub struct TestScriptDocument {
    pub path: PathBuf,
    /// Feature code, taken from the enclosing directory name
    pub feature: String,
    pub mode: Mode,
    pub test_cases: Vec<TestCase>,
    /// Raw document text, kept for body-wide rules
    #[serde(skip)]
    pub source: String,
}

impl TestScriptDocument {
    pub fn display_path(&self) -> String {
        display_path(&self.path)
    }

    /// Iterate over the raw body with 1-based line numbers
    pub fn lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.source.lines().enumerate().map(|(i, l)| (i + 1, l))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    /// Line of the `Test Case:` heading
    pub line: usize,
    pub prerequisites: Vec<Prerequisite>,
    pub setup_script: Option<SetupScript>,
    pub starting_url: Option<StartingUrl>,
    pub steps: Vec<Step>,
    pub expected_ui_state: Vec<UiStateEntry>,
    pub expected_result: ExpectedResult,
    pub screenshots: Vec<ScreenshotPlaceholder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prerequisite {
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupScript {
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartingUrl {
    pub url: String,
    pub line: usize,
}

/// One numbered test step. `number` is the number as written, which the
/// `step-numbering` rule compares against the 1-based position.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub number: u32,
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiStateEntry {
    /// `None` when the line carries no marker glyph
    pub marker: Option<Marker>,
    pub element: String,
    pub description: String,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpectedResult {
    pub text: String,
    /// Line of the section heading
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenshotPlaceholder {
    pub path: String,
    pub description: String,
    pub line: usize,
}

// ============================================================================
// Screenshot paths
// ============================================================================

static SCREENSHOT_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^qa/([a-z0-9][a-z0-9_-]*)/screenshots/([A-Z]+-[0-9]{3,})_([0-9]{2,})-([a-z0-9]+(?:-[a-z0-9]+)*)\.png$",
    )
    .expect("screenshot path pattern")
});

/// Components of a well-formed
/// `qa/<feature>/screenshots/<TestID>_<step>-<element>.png` path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotPath {
    pub feature: String,
    pub test_id: String,
    pub step: u32,
    pub element: String,
}

impl ScreenshotPath {
    /// Strict parse; `None` when the path does not have the canonical shape
    pub fn parse(path: &str) -> Option<Self> {
        let caps = SCREENSHOT_PATH_RE.captures(path)?;
        Some(Self {
            feature: caps[1].to_string(),
            test_id: caps[2].to_string(),
            step: caps[3].parse().ok()?,
            element: caps[4].to_string(),
        })
    }

    /// Loose lookup of the `<feature>` segment of any `qa/<feature>/...` path
    pub fn feature_segment(path: &str) -> Option<&str> {
        let mut parts = path.split('/');
        match (parts.next(), parts.next()) {
            (Some("qa"), Some(feature)) if !feature.is_empty() => Some(feature),
            _ => None,
        }
    }

    /// File name of a placeholder that points directly into
    /// `qa/<feature>/screenshots/`
    pub fn screenshot_file_name<'a>(path: &'a str, feature: &str) -> Option<&'a str> {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            ["qa", f, "screenshots", name] if *f == feature && !name.is_empty() => Some(*name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_file_name() {
        assert_eq!(Mode::from_file_name("admin-access.mock.md"), Some(Mode::Mock));
        assert_eq!(Mode::from_file_name("admin-access.full.md"), Some(Mode::Full));
        assert_eq!(Mode::from_file_name("README.md"), None);
        assert_eq!(Mode::from_file_name("mock.txt"), None);
    }

    #[test]
    fn test_section_order_and_labels() {
        assert!(Section::Prerequisites < Section::Screenshots);
        assert_eq!(Section::from_label("Expected UI State"), Some(Section::ExpectedUiState));
        assert_eq!(Section::from_label("expected ui state"), None);
        assert_eq!(Section::TestSteps.index(), 3);
        assert!(!Section::SetupScripts.is_required());
    }

    #[test]
    fn test_screenshot_path_parse() {
        let parsed = ScreenshotPath::parse("qa/acl/screenshots/ACL-001_03-card.png").unwrap();
        assert_eq!(parsed.feature, "acl");
        assert_eq!(parsed.test_id, "ACL-001");
        assert_eq!(parsed.step, 3);
        assert_eq!(parsed.element, "card");

        assert!(ScreenshotPath::parse("qa/acl/screenshots/ACL-001-card.png").is_none());
        assert!(ScreenshotPath::parse("qa/acl/shots/ACL-001_03-card.png").is_none());
        assert!(ScreenshotPath::parse("qa/acl/screenshots/ACL-001_03-card.jpg").is_none());
    }

    #[test]
    fn test_feature_segment() {
        assert_eq!(ScreenshotPath::feature_segment("qa/auth/screenshots/x.png"), Some("auth"));
        assert_eq!(ScreenshotPath::feature_segment("docs/auth/x.png"), None);
        assert_eq!(
            ScreenshotPath::screenshot_file_name("qa/acl/screenshots/ACL-001_03-card.png", "acl"),
            Some("ACL-001_03-card.png")
        );
        assert_eq!(
            ScreenshotPath::screenshot_file_name("qa/acl/screenshots/ACL-001_03-card.png", "auth"),
            None
        );
    }

    #[test]
    fn test_diagnostic_serializes_contract_fields_only() {
        let diag = Diagnostic::parse_error("qa/acl/a.mock.md", Some(4), "section-order", "boom");
        let json = serde_json::to_value(&diag).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(json["ruleId"], "section-order");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["line"], 4);
    }
}
