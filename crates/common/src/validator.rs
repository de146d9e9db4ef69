//! Validation driver
//!
//! Scans every root, runs read + parse + rule evaluation for each document
//! on the blocking pool, waits for all of them, then runs the consistency
//! checks per feature directory and builds the [`Report`].

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::ValidatorConfig;
use crate::consistency::check_feature;
use crate::error::{Error, Result};
use crate::model::{display_path, Diagnostic, DiagnosticKind, Severity, TestScriptDocument};
use crate::parser::parse_document;
use crate::report::{DiagnosticSink, FailurePolicy, Report};
use crate::rules::{RuleEngine, RuleSet};
use crate::scan::{scan, DocumentDescriptor, FeatureDescriptor};

/// Validates trees of test-script documents
#[derive(Debug, Clone)]
pub struct Validator {
    config: Arc<ValidatorConfig>,
    engine: Arc<RuleEngine>,
}

impl Validator {
    /// Build a validator with the builtin rules adjusted by `config.rules`
    pub fn new(config: ValidatorConfig) -> Result<Self> {
        let rules = RuleSet::builtin().configure(&config.rules)?;
        Ok(Self::with_rules(config, rules))
    }

    pub fn with_rules(config: ValidatorConfig, rules: RuleSet) -> Self {
        let config = Arc::new(config);
        let engine = Arc::new(RuleEngine::new(rules, Arc::clone(&config)));
        Self { config, engine }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        self.engine.rules()
    }

    /// Failure policy for this run; `strict` comes from the command line
    pub fn failure_policy(&self, strict: bool) -> FailurePolicy {
        FailurePolicy {
            fail_on_warnings: strict || self.config.report.fail_on_warnings,
        }
    }

    /// Validate everything under `roots`.
    ///
    /// Document problems end up in the report. `Err` is reserved for
    /// failures of the driver itself.
    pub async fn validate(&self, roots: &[PathBuf]) -> Result<Report> {
        let sink = DiagnosticSink::new();
        let mut documents: BTreeMap<PathBuf, DocumentDescriptor> = BTreeMap::new();
        let mut features: BTreeMap<PathBuf, FeatureDescriptor> = BTreeMap::new();
        // Resolved path -> the spelling first seen, shared by overlapping roots
        let mut aliases: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        let mut scan_problems: BTreeSet<(String, String)> = BTreeSet::new();
        let mut seen_roots: BTreeSet<PathBuf> = BTreeSet::new();

        for root in roots {
            if !seen_roots.insert(resolved(root)) {
                debug!("Skipping repeated root {}", root.display());
                continue;
            }
            let scan_root = root.clone();
            let scan_config = self.config.scan.clone();
            let result = tokio::task::spawn_blocking(move || scan(&scan_root, &scan_config))
                .await
                .map_err(|e| Error::Internal(format!("scan task failed: {}", e)))?;

            // A path unreadable from two roots is one problem
            for diagnostic in result.diagnostics {
                if scan_problems.insert((diagnostic.file.clone(), diagnostic.message.clone())) {
                    sink.push(diagnostic);
                }
            }
            for doc in result.documents {
                if let Entry::Vacant(slot) = aliases.entry(resolved(&doc.path)) {
                    slot.insert(doc.path.clone());
                    documents.insert(doc.path.clone(), doc);
                }
            }
            for mut feature in result.features {
                feature.documents = feature
                    .documents
                    .iter()
                    .filter_map(|path| aliases.get(&resolved(path)).cloned())
                    .collect();
                merge_feature(&mut features, resolved(&feature.dir), feature);
            }
        }

        info!(
            "Validating {} document(s) in {} feature(s)",
            documents.len(),
            features.len()
        );

        let parsed = self.check_documents(&documents, &sink).await?;

        // All per-document work is done; cross-document checks may start
        for feature in features.values() {
            let docs: Vec<&TestScriptDocument> = feature
                .documents
                .iter()
                .filter_map(|path| parsed.get(path))
                .collect();
            sink.extend(check_feature(feature, &docs));
        }

        let report = Report::new(sink.drain(), documents.len(), features.len());
        let summary = report.summary();
        debug!(
            "Run finished: {} error(s), {} warning(s), {} info",
            summary.errors, summary.warnings, summary.infos
        );
        Ok(report)
    }

    async fn check_documents(
        &self,
        documents: &BTreeMap<PathBuf, DocumentDescriptor>,
        sink: &DiagnosticSink,
    ) -> Result<BTreeMap<PathBuf, TestScriptDocument>> {
        let jobs = self.config.jobs();
        debug!("Checking documents with {} concurrent job(s)", jobs);

        let semaphore = Arc::new(Semaphore::new(jobs));
        let mut tasks = JoinSet::new();

        for path in documents.keys() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("job limiter closed: {}", e)))?;
            let path = path.clone();
            let config = Arc::clone(&self.config);
            let engine = Arc::clone(&self.engine);
            let sink = sink.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let checked =
                    std::panic::catch_unwind(AssertUnwindSafe(|| check_document(&path, &config, &engine)));
                match checked {
                    Ok((doc, diagnostics)) => {
                        sink.extend(diagnostics);
                        doc
                    }
                    Err(_) => {
                        warn!("Checking {} panicked", path.display());
                        sink.push(Diagnostic::new(
                            DiagnosticKind::IoError,
                            Severity::Error,
                            "internal-error",
                            display_path(&path),
                            None,
                            "internal error while checking document",
                        ));
                        None
                    }
                }
            });
        }

        let mut parsed = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(doc)) => {
                    parsed.insert(doc.path.clone(), doc);
                }
                Ok(None) => {}
                Err(e) => return Err(Error::Internal(format!("document task failed: {}", e))),
            }
        }
        Ok(parsed)
    }
}

fn resolved(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn merge_feature(
    features: &mut BTreeMap<PathBuf, FeatureDescriptor>,
    key: PathBuf,
    feature: FeatureDescriptor,
) {
    match features.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(feature);
        }
        Entry::Occupied(mut slot) => {
            let existing = slot.get_mut();
            for path in feature.documents {
                if !existing.documents.contains(&path) {
                    existing.documents.push(path);
                }
            }
            existing.screenshots.extend(feature.screenshots);
        }
    }
}

/// Read, parse and evaluate one document.
///
/// Returns the parsed document when it had no structural errors, plus every
/// diagnostic produced along the way.
pub fn check_document(
    path: &Path,
    config: &ValidatorConfig,
    engine: &RuleEngine,
) -> (Option<TestScriptDocument>, Vec<Diagnostic>) {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            return (
                None,
                vec![Diagnostic::io_error(
                    display_path(path),
                    format!("cannot read document: {}", e),
                )],
            )
        }
    };

    match parse_document(path, &text, &config.markers) {
        Ok(doc) => {
            let diagnostics = engine.evaluate(&doc);
            debug!("{}: {} rule violation(s)", doc.display_path(), diagnostics.len());
            (Some(doc), diagnostics)
        }
        Err(diagnostics) => {
            debug!("{}: {} parse error(s)", path.display(), diagnostics.len());
            (None, diagnostics)
        }
    }
}
