//! Cross-document consistency checks
//!
//! Run once per feature directory, after every document in the run has been
//! parsed. Works purely on parsed documents and the scanner's screenshot
//! listing; no filesystem access happens here.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::model::{display_path, Diagnostic, DiagnosticKind, Mode, ScreenshotPath, Severity, TestScriptDocument};
use crate::scan::FeatureDescriptor;

static DECLARED_MODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:mode|services?)\s*:\s*([a-z]+)").expect("declared mode pattern")
});

/// Directory names that pin a mode on everything below them
const MODE_DIRS: [(&str, Mode); 4] = [
    ("mock", Mode::Mock),
    ("mocks", Mode::Mock),
    ("full", Mode::Full),
    ("live", Mode::Full),
];

fn consistency(
    severity: Severity,
    rule_id: &str,
    file: String,
    line: Option<usize>,
    message: String,
) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::ConsistencyError, severity, rule_id, file, line, message)
}

/// Check one feature directory.
///
/// `documents` holds the documents of `feature` that parsed successfully.
/// Orphaned screenshots are only reported when every document of the
/// feature parsed, since a failed document may own the reference.
pub fn check_feature(feature: &FeatureDescriptor, documents: &[&TestScriptDocument]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    duplicate_ids(documents, &mut diagnostics);
    for doc in documents {
        mode_placement(doc, &mut diagnostics);
    }
    missing_screenshots(feature, documents, &mut diagnostics);

    if documents.len() == feature.documents.len() {
        orphaned_screenshots(feature, documents, &mut diagnostics);
    } else {
        debug!(
            "Skipping orphan check for {}: {} of {} document(s) parsed",
            feature.dir.display(),
            documents.len(),
            feature.documents.len()
        );
    }

    diagnostics
}

fn duplicate_ids(documents: &[&TestScriptDocument], diagnostics: &mut Vec<Diagnostic>) {
    let mut by_id: BTreeMap<&str, Vec<(String, usize)>> = BTreeMap::new();
    for doc in documents {
        for tc in &doc.test_cases {
            by_id
                .entry(tc.id.as_str())
                .or_default()
                .push((doc.display_path(), tc.line));
        }
    }

    for (id, mut owners) in by_id {
        if owners.len() < 2 {
            continue;
        }
        owners.sort();
        let files: Vec<&str> = owners.iter().map(|(f, _)| f.as_str()).collect();
        diagnostics.push(consistency(
            Severity::Error,
            "duplicate-id",
            owners[0].0.clone(),
            Some(owners[0].1),
            format!(
                "test case id '{}' is declared by {} documents: {}",
                id,
                owners.len(),
                files.join(", ")
            ),
        ));
    }
}

fn mode_placement(doc: &TestScriptDocument, diagnostics: &mut Vec<Diagnostic>) {
    // The feature directory and its parent are the only placement levels
    let placement = doc
        .path
        .ancestors()
        .skip(1)
        .take(2)
        .filter_map(|dir| dir.file_name())
        .filter_map(|name| {
            let name = name.to_string_lossy().to_lowercase();
            MODE_DIRS
                .iter()
                .find(|(dir, _)| *dir == name)
                .map(|(dir, mode)| (dir.to_string(), *mode))
        })
        .find(|(_, mode)| *mode != doc.mode);

    if let Some((dir, mode)) = placement {
        diagnostics.push(consistency(
            Severity::Error,
            "mode-placement",
            doc.display_path(),
            None,
            format!(
                "{} document is placed under a '{}' directory, which holds {} documents",
                doc.mode, dir, mode
            ),
        ));
    }

    for tc in &doc.test_cases {
        let declared = tc.prerequisites.iter().find_map(|p| {
            let caps = DECLARED_MODE_RE.captures(&p.text)?;
            declared_mode(&caps[1]).map(|mode| (p, mode))
        });
        if let Some((prerequisite, mode)) = declared {
            if mode != doc.mode {
                diagnostics.push(consistency(
                    Severity::Error,
                    "mode-placement",
                    doc.display_path(),
                    Some(prerequisite.line),
                    format!(
                        "file name declares {} mode but prerequisites declare {} services ('{}')",
                        doc.mode, mode, prerequisite.text
                    ),
                ));
            }
        }
    }
}

fn declared_mode(word: &str) -> Option<Mode> {
    match word.to_lowercase().as_str() {
        "mock" | "mocks" | "mocked" | "simulated" => Some(Mode::Mock),
        "full" | "live" | "real" => Some(Mode::Full),
        _ => None,
    }
}

fn missing_screenshots(
    feature: &FeatureDescriptor,
    documents: &[&TestScriptDocument],
    diagnostics: &mut Vec<Diagnostic>,
) {
    for doc in documents {
        for shot in doc.test_cases.iter().flat_map(|tc| &tc.screenshots) {
            let Some(name) = ScreenshotPath::screenshot_file_name(&shot.path, &feature.name) else {
                continue;
            };
            if !feature.screenshots.contains(name) {
                diagnostics.push(consistency(
                    Severity::Warning,
                    "screenshot-missing",
                    doc.display_path(),
                    Some(shot.line),
                    format!(
                        "screenshot '{}' not found in {}",
                        shot.path,
                        display_path(&feature.screenshot_dir())
                    ),
                ));
            }
        }
    }
}

fn orphaned_screenshots(
    feature: &FeatureDescriptor,
    documents: &[&TestScriptDocument],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let referenced: BTreeSet<&str> = documents
        .iter()
        .flat_map(|doc| doc.test_cases.iter())
        .flat_map(|tc| tc.screenshots.iter())
        .filter_map(|shot| ScreenshotPath::screenshot_file_name(&shot.path, &feature.name))
        .collect();

    for name in &feature.screenshots {
        if !referenced.contains(name.as_str()) {
            diagnostics.push(consistency(
                Severity::Info,
                "screenshot-orphan",
                display_path(&feature.screenshot_dir().join(name)),
                None,
                "screenshot is not referenced by any placeholder".to_string(),
            ));
        }
    }
}
