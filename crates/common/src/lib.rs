//! Scriptcheck Common Library
//!
//! Parser, rule engine, consistency checks and reporting for QA test-script
//! documents laid out as `qa/<feature>/<name>.(mock|full).md`.

pub mod config;
pub mod consistency;
pub mod error;
pub mod model;
pub mod parser;
pub mod report;
pub mod rules;
pub mod scan;
pub mod validator;

// Re-export commonly used types
pub use config::ValidatorConfig;
pub use error::{Error, Result};
pub use model::{Diagnostic, DiagnosticKind, Mode, Severity, TestScriptDocument};
pub use report::{FailurePolicy, Outcome, Report, Summary};
pub use rules::{RuleEngine, RuleSet};
pub use validator::Validator;

/// Scriptcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "scriptcheck.toml";
