//! Validator configuration
//!
//! Loaded from an optional TOML file. Every section has defaults, so an
//! empty or missing file yields the stock behaviour.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Severity;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Maximum number of documents processed concurrently
    pub jobs: Option<usize>,

    pub scan: ScanConfig,

    pub report: ReportConfig,

    pub rules: RulesConfig,

    pub markers: MarkerConfig,

    pub modes: ModeConfig,

    pub heuristics: HeuristicsConfig,

    pub features: FeatureConfig,
}

/// Document discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory names never descended into
    pub exclude: Vec<String>,

    /// Report `.md` files lacking a `.mock.md` / `.full.md` suffix
    /// instead of skipping them
    pub include_unsuffixed: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "node_modules".to_string(),
                "target".to_string(),
                "screenshots".to_string(),
            ],
            include_unsuffixed: false,
        }
    }
}

/// Pass/fail policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Count warnings as failures, same as `--strict`
    pub fail_on_warnings: bool,
}

/// Rule selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule ids removed from the rule set
    pub disabled: Vec<String>,

    /// Per-rule severity overrides
    pub severity: BTreeMap<String, Severity>,
}

/// Expected UI State marker glyphs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub present: Vec<String>,
    pub absent: Vec<String>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            present: vec!["✅".to_string()],
            absent: vec!["❌".to_string()],
        }
    }
}

/// Body markers that identify a document's mode. Matched case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    pub mock_markers: Vec<String>,
    pub full_markers: Vec<String>,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            mock_markers: vec![
                "[mock]".to_string(),
                "mocked service".to_string(),
                "mocked api".to_string(),
                "mock server".to_string(),
                "mock service worker".to_string(),
                "use_mocks=true".to_string(),
            ],
            full_markers: vec![
                "[full]".to_string(),
                "live environment".to_string(),
                "live backend".to_string(),
                "real backend".to_string(),
                "use_mocks=false".to_string(),
            ],
        }
    }
}

/// Tuning for `single-scenario-heuristic`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub role_keywords: Vec<String>,

    /// Distinct roles at which the warning fires
    pub role_threshold: usize,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            role_keywords: ["admin", "viewer", "editor", "owner", "guest", "member", "moderator", "superuser"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            role_threshold: 2,
        }
    }
}

/// Feature directory settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Test id prefix per feature directory, when it is not simply the
    /// upper-cased directory name
    pub prefixes: BTreeMap<String, String>,
}

impl FeatureConfig {
    /// Id prefix expected for documents of `feature`
    pub fn prefix_for(&self, feature: &str) -> String {
        match self.prefixes.get(feature) {
            Some(prefix) => prefix.clone(),
            None => feature
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from file, falling back to defaults when it does
    /// not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run can work with
    pub fn validate(&self) -> Result<()> {
        if self.jobs == Some(0) {
            return Err(Error::Config("jobs must be at least 1".to_string()));
        }
        if self.markers.present.iter().chain(&self.markers.absent).any(|m| m.trim().is_empty()) {
            return Err(Error::Config("marker glyphs must not be empty".to_string()));
        }
        if self.heuristics.role_threshold == 0 {
            return Err(Error::Config("heuristics.role_threshold must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Effective concurrency limit
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}
