//! Document discovery
//!
//! [`scan`] maps a root path to the documents and feature directories below
//! it. It only reads the filesystem; unreadable entries are reported as
//! diagnostics and the walk carries on with their siblings.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::model::{display_path, Diagnostic, Mode};

/// Directory (inside a feature directory) holding captured screenshots
pub const SCREENSHOT_DIR: &str = "screenshots";

/// A document found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescriptor {
    pub path: PathBuf,
    /// Feature directory the document lives in
    pub feature_dir: PathBuf,
    pub feature: String,
    /// `None` when the file name has no mode suffix
    pub mode: Option<Mode>,
}

/// A directory directly containing at least one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDescriptor {
    pub dir: PathBuf,
    pub name: String,
    pub documents: Vec<PathBuf>,
    /// PNG file names found in `<dir>/screenshots/`
    pub screenshots: BTreeSet<String>,
}

impl FeatureDescriptor {
    pub fn screenshot_dir(&self) -> PathBuf {
        self.dir.join(SCREENSHOT_DIR)
    }
}

/// Everything discovered under one root
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub documents: Vec<DocumentDescriptor>,
    pub features: Vec<FeatureDescriptor>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Discover documents and feature directories under `root`.
///
/// `root` may also name a single document file.
pub fn scan(root: &Path, config: &ScanConfig) -> ScanResult {
    let mut result = ScanResult::default();

    let metadata = match std::fs::metadata(root) {
        Ok(m) => m,
        Err(e) => {
            result
                .diagnostics
                .push(Diagnostic::io_error(display_path(root), format!("cannot read path: {}", e)));
            return result;
        }
    };

    if metadata.is_file() {
        if let Some(doc) = describe(root, config) {
            result.documents.push(doc);
        } else {
            debug!("Skipping {}: not a test-script document", root.display());
        }
    } else {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_excluded(e, config));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let path = e.path().unwrap_or(root);
                    result
                        .diagnostics
                        .push(Diagnostic::io_error(display_path(path), format!("cannot read path: {}", e)));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(doc) = describe(entry.path(), config) {
                result.documents.push(doc);
            }
        }
    }

    let mut by_dir: BTreeMap<PathBuf, FeatureDescriptor> = BTreeMap::new();
    for doc in &result.documents {
        by_dir
            .entry(doc.feature_dir.clone())
            .or_insert_with(|| FeatureDescriptor {
                dir: doc.feature_dir.clone(),
                name: doc.feature.clone(),
                documents: Vec::new(),
                screenshots: BTreeSet::new(),
            })
            .documents
            .push(doc.path.clone());
    }

    for mut feature in by_dir.into_values() {
        match list_screenshots(&feature.screenshot_dir()) {
            Ok(names) => feature.screenshots = names,
            Err(diag) => result.diagnostics.push(diag),
        }
        result.features.push(feature);
    }

    debug!(
        "Scanned {}: {} document(s) in {} feature(s)",
        root.display(),
        result.documents.len(),
        result.features.len()
    );

    result
}

fn is_excluded(entry: &DirEntry, config: &ScanConfig) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    entry.file_type().is_dir() && config.exclude.iter().any(|e| *e == name)
}

fn describe(path: &Path, config: &ScanConfig) -> Option<DocumentDescriptor> {
    let name = path.file_name()?.to_str()?;
    let mode = Mode::from_file_name(name);
    if mode.is_none() {
        let unsuffixed = name.ends_with(".md") && !name.eq_ignore_ascii_case("README.md");
        if !(config.include_unsuffixed && unsuffixed) {
            return None;
        }
    }

    Some(DocumentDescriptor {
        path: path.to_path_buf(),
        feature_dir: feature_dir(path),
        feature: feature_name(path),
        mode,
    })
}

/// Directory holding `path`; a bare file name lives in `.`
pub fn feature_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Feature a document belongs to: the name of its directory, resolved
/// against the working directory for relative paths like `.` or `doc.mock.md`
pub fn feature_name(path: &Path) -> String {
    let dir = feature_dir(path);
    let resolved = dir.canonicalize().unwrap_or(dir);
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn list_screenshots(dir: &Path) -> Result<BTreeSet<String>, Diagnostic> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => {
            return Err(Diagnostic::io_error(
                display_path(dir),
                format!("cannot list screenshots: {}", e),
            ))
        }
    };

    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Diagnostic::io_error(display_path(dir), format!("cannot list screenshots: {}", e))
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().map(|e| e == "png").unwrap_or(false) {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_scan_finds_documents_and_screenshots() {
        let dir = tempfile::tempdir().unwrap();
        let qa = dir.path().join("qa");
        touch(&qa.join("acl/viewer-access.full.md"));
        touch(&qa.join("acl/admin-access.mock.md"));
        touch(&qa.join("acl/README.md"));
        touch(&qa.join("acl/screenshots/ACL-001_03-card.png"));
        touch(&qa.join("acl/screenshots/notes.txt"));
        touch(&qa.join("auth/login.mock.md"));

        let result = scan(&qa, &ScanConfig::default());
        assert!(result.diagnostics.is_empty());

        let names: Vec<_> = result
            .documents
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["admin-access.mock.md", "viewer-access.full.md", "login.mock.md"]);
        assert_eq!(result.documents[0].feature, "acl");
        assert_eq!(result.documents[1].mode, Some(Mode::Full));

        assert_eq!(result.features.len(), 2);
        let acl = &result.features[0];
        assert_eq!(acl.name, "acl");
        assert_eq!(acl.documents.len(), 2);
        assert_eq!(
            acl.screenshots.iter().cloned().collect::<Vec<_>>(),
            vec!["ACL-001_03-card.png".to_string()]
        );
        assert!(result.features[1].screenshots.is_empty());
    }

    #[test]
    fn test_scan_unsuffixed_documents_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("qa/acl/notes.md"));
        touch(&dir.path().join("qa/acl/README.md"));

        let skipped = scan(dir.path(), &ScanConfig::default());
        assert!(skipped.documents.is_empty());

        let config = ScanConfig {
            include_unsuffixed: true,
            ..Default::default()
        };
        let included = scan(dir.path(), &config);
        assert_eq!(included.documents.len(), 1);
        assert_eq!(included.documents[0].mode, None);
    }

    #[test]
    fn test_scan_skips_hidden_and_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join(".git/qa/acl/a.mock.md"));
        touch(&dir.path().join("node_modules/pkg/b.mock.md"));
        touch(&dir.path().join("qa/acl/c.mock.md"));

        let result = scan(dir.path(), &ScanConfig::default());
        assert_eq!(result.documents.len(), 1);
    }

    #[test]
    fn test_scan_missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = scan(&dir.path().join("nope"), &ScanConfig::default());
        assert!(result.documents.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].rule_id, "io-error");
    }

    #[test]
    fn test_scan_single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("qa/auth/login.mock.md");
        touch(&doc);

        let result = scan(&doc, &ScanConfig::default());
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].feature, "auth");
        assert_eq!(result.features.len(), 1);
    }
}
