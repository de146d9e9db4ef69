//! Scriptcheck E2E Test Support
//!
//! Builds throwaway `qa/` trees on disk and runs the validator over them.
//!
//! ```text
//! <tempdir>/
//! └── qa/
//!     └── <feature>/
//!         ├── <name>.mock.md
//!         ├── <name>.full.md
//!         └── screenshots/
//!             └── <TestID>_<step>-<element>.png
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use scriptcheck_common::{Diagnostic, Report, Validator, ValidatorConfig};
use tempfile::TempDir;

/// Smallest valid PNG signature; the validator never decodes images
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// A `qa/` tree inside a temporary directory
pub struct QaTree {
    dir: TempDir,
}

impl QaTree {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("qa"))?;
        Ok(Self { dir })
    }

    /// The temporary directory holding `qa/`
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn qa_root(&self) -> PathBuf {
        self.dir.path().join("qa")
    }

    /// Write `qa/<feature>/<file_name>`
    pub fn write_doc(&self, feature: &str, file_name: &str, content: &str) -> std::io::Result<PathBuf> {
        let dir = self.qa_root().join(feature);
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Write `qa/<feature>/screenshots/<name>`
    pub fn write_screenshot(&self, feature: &str, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.qa_root().join(feature).join("screenshots");
        fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        fs::write(&path, PNG_MAGIC)?;
        Ok(path)
    }

    /// Validate the whole `qa/` tree with `config`
    pub fn validate_with(&self, config: ValidatorConfig) -> scriptcheck_common::Result<Report> {
        let validator = Validator::new(config)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| scriptcheck_common::Error::io(self.path(), e))?;
        runtime.block_on(validator.validate(&[self.qa_root()]))
    }

    pub fn validate(&self) -> scriptcheck_common::Result<Report> {
        self.validate_with(ValidatorConfig::default())
    }
}

/// Diagnostics of `report` carrying `rule_id`
pub fn with_rule<'a>(report: &'a Report, rule_id: &str) -> Vec<&'a Diagnostic> {
    report
        .diagnostics()
        .iter()
        .filter(|d| d.rule_id == rule_id)
        .collect()
}

/// 1-based line of the first line of `text` containing `needle`
pub fn line_of(text: &str, needle: &str) -> Option<usize> {
    text.lines().position(|l| l.contains(needle)).map(|i| i + 1)
}

/// Renders test-script documents, starting from a valid template
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    id: String,
    name: String,
    prerequisites: Vec<String>,
    starting_url: Option<String>,
    steps: Vec<String>,
    ui_state: Vec<String>,
    expected_result: Option<String>,
    screenshots: Vec<String>,
}

impl DocumentBuilder {
    /// A document for `feature` that passes every rule once its screenshot
    /// `qa/<feature>/screenshots/<ID>_03-card.png` exists
    pub fn template(feature: &str, id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: "Admin can open the access card".to_string(),
            prerequisites: vec!["Signed in as an admin".to_string()],
            starting_url: Some("http://localhost:3000/admin".to_string()),
            steps: vec![
                "Open the admin dashboard".to_string(),
                "Click the Access tab".to_string(),
                "Select the first access card".to_string(),
            ],
            ui_state: vec![
                "- ✅ **Access Card**: Visible with the admin badge".to_string(),
                "- ❌ **Error Banner**: Not rendered".to_string(),
            ],
            expected_result: Some("The access card for the selected user is shown.".to_string()),
            screenshots: vec![format!(
                "- <screenshot:{}|Access card after selection>",
                Self::screenshot_path(feature, id)
            )],
        }
    }

    /// Placeholder path the template references
    pub fn screenshot_path(feature: &str, id: &str) -> String {
        format!("qa/{}/screenshots/{}", feature, Self::screenshot_name(id))
    }

    pub fn screenshot_name(id: &str) -> String {
        format!("{}_03-card.png", id)
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn prerequisite(mut self, text: &str) -> Self {
        self.prerequisites.push(text.to_string());
        self
    }

    pub fn step(mut self, text: &str) -> Self {
        self.steps.push(text.to_string());
        self
    }

    /// Append a raw `Expected UI State` line
    pub fn ui_state(mut self, line: &str) -> Self {
        self.ui_state.push(line.to_string());
        self
    }

    pub fn without_expected_result(mut self) -> Self {
        self.expected_result = None;
        self
    }

    /// Replace the placeholders with a single one
    pub fn screenshot(mut self, path: &str, description: &str) -> Self {
        self.screenshots = vec![format!("- <screenshot:{}|{}>", path, description)];
        self
    }

    pub fn without_screenshots(mut self) -> Self {
        self.screenshots.clear();
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!("# Test Case: {} - {}\n", self.id, self.name);

        out.push_str("## Prerequisites\n");
        for p in &self.prerequisites {
            out.push_str(&format!("- {}\n", p));
        }

        if let Some(url) = &self.starting_url {
            out.push_str(&format!("## Starting URL\n{}\n", url));
        }

        out.push_str("## Test Steps\n");
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, step));
        }

        out.push_str("## Expected UI State\n");
        for line in &self.ui_state {
            out.push_str(line);
            out.push('\n');
        }

        if let Some(result) = &self.expected_result {
            out.push_str(&format!("## Expected Result\n{}\n", result));
        }

        if !self.screenshots.is_empty() {
            out.push_str("## Screenshots\n");
            for line in &self.screenshots {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_layout() {
        let text = DocumentBuilder::template("acl", "ACL-001").render();
        assert!(text.starts_with("# Test Case: ACL-001 - Admin can open the access card\n"));
        assert_eq!(line_of(&text, "## Expected Result"), Some(13));
        assert!(text.contains("<screenshot:qa/acl/screenshots/ACL-001_03-card.png|"));
    }

    #[test]
    fn test_tree_layout() {
        let tree = QaTree::new().unwrap();
        let doc = tree.write_doc("acl", "admin-access.mock.md", "x").unwrap();
        let shot = tree.write_screenshot("acl", "ACL-001_03-card.png").unwrap();
        assert_eq!(doc, tree.path().join("qa/acl/admin-access.mock.md"));
        assert!(shot.ends_with("qa/acl/screenshots/ACL-001_03-card.png"));
    }
}
