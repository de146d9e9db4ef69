//! Rule engine
//!
//! A [`RuleSet`] is an explicit, immutable list of [`RuleDescriptor`]s built
//! once and handed to the [`RuleEngine`]. The engine runs every rule against
//! a document and returns the union of their findings; no rule can stop
//! another from running.

mod builtin;

use std::sync::Arc;

use crate::config::{RulesConfig, ValidatorConfig};
use crate::error::{Error, Result};
use crate::model::{Diagnostic, DiagnosticKind, Severity, TestScriptDocument};

/// One violation reported by a rule check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: Option<usize>,
    pub message: String,
}

impl Finding {
    pub fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

/// Everything a rule check may look at besides the document
pub struct RuleContext<'a> {
    pub config: &'a ValidatorConfig,
}

/// A pure check over one parsed document
pub type CheckFn = fn(&RuleContext<'_>, &TestScriptDocument) -> Vec<Finding>;

/// Rule id, default severity and the check itself
#[derive(Clone, Copy)]
pub struct RuleDescriptor {
    pub id: &'static str,
    pub severity: Severity,
    pub summary: &'static str,
    pub check: CheckFn,
}

impl std::fmt::Debug for RuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleDescriptor")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Ordered, immutable rule list
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Arc<[RuleDescriptor]>,
}

impl RuleSet {
    pub fn new(rules: Vec<RuleDescriptor>) -> Self {
        Self { rules: rules.into() }
    }

    /// The stock rule set, in evaluation order
    pub fn builtin() -> Self {
        Self::new(builtin::descriptors())
    }

    /// Apply `[rules]` config: drop disabled rules, override severities.
    /// Unknown rule ids are a configuration error.
    pub fn configure(&self, config: &RulesConfig) -> Result<Self> {
        for id in config.disabled.iter().chain(config.severity.keys()) {
            if self.get(id).is_none() {
                return Err(Error::Config(format!("unknown rule id '{}'", id)));
            }
        }

        let rules = self
            .rules
            .iter()
            .filter(|r| !config.disabled.iter().any(|d| d == r.id))
            .map(|r| RuleDescriptor {
                severity: config.severity.get(r.id).copied().unwrap_or(r.severity),
                ..*r
            })
            .collect();
        Ok(Self::new(rules))
    }

    pub fn get(&self, id: &str) -> Option<&RuleDescriptor> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Evaluates a rule set against parsed documents
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: RuleSet,
    config: Arc<ValidatorConfig>,
}

impl RuleEngine {
    pub fn new(rules: RuleSet, config: Arc<ValidatorConfig>) -> Self {
        Self { rules, config }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Run every rule; violations sorted by line, then rule id
    pub fn evaluate(&self, doc: &TestScriptDocument) -> Vec<Diagnostic> {
        let ctx = RuleContext {
            config: &self.config,
        };
        let file = doc.display_path();

        let mut diagnostics: Vec<Diagnostic> = self
            .rules
            .iter()
            .flat_map(|rule| {
                (rule.check)(&ctx, doc).into_iter().map(|finding| {
                    Diagnostic::new(
                        DiagnosticKind::SchemaViolation,
                        rule.severity,
                        rule.id,
                        file.clone(),
                        finding.line,
                        finding.message,
                    )
                })
            })
            .collect();

        diagnostics.sort_by(|a, b| {
            (a.line, &a.rule_id, &a.message).cmp(&(b.line, &b.rule_id, &b.message))
        });
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::config::MarkerConfig;
    use crate::parser::parse_document;

    fn engine_with(rules: RuleSet) -> RuleEngine {
        RuleEngine::new(rules, Arc::new(ValidatorConfig::default()))
    }

    fn always_fails(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
        vec![Finding::at(doc.test_cases[0].line, "always")]
    }

    const DOC: &str = "\
# Test Case: acl-1
## Prerequisites
- Signed in
## Test Steps
1. Open the page
## Expected UI State
**Card**: Visible
## Expected Result
";

    fn doc() -> TestScriptDocument {
        parse_document(Path::new("qa/acl/card.mock.md"), DOC, &MarkerConfig::default()).unwrap()
    }

    #[test]
    fn test_rules_do_not_short_circuit() {
        let diagnostics = engine_with(RuleSet::builtin()).evaluate(&doc());
        let ids: Vec<_> = diagnostics.iter().map(|d| d.rule_id.as_str()).collect();
        assert!(ids.contains(&"id-format"));
        assert!(ids.contains(&"id-prefix-matches-feature"));
        assert!(ids.contains(&"ui-state-marker"));
        assert!(ids.contains(&"expected-result-nonempty"));
    }

    #[test]
    fn test_results_sorted_by_line_then_rule() {
        let diagnostics = engine_with(RuleSet::builtin()).evaluate(&doc());
        let keys: Vec<_> = diagnostics.iter().map(|d| (d.line, d.rule_id.clone())).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_custom_rule_list() {
        let rules = RuleSet::new(vec![RuleDescriptor {
            id: "always",
            severity: Severity::Info,
            summary: "always fires",
            check: always_fails,
        }]);
        let diagnostics = engine_with(rules).evaluate(&doc());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Info);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::SchemaViolation);
        assert_eq!(diagnostics[0].file, "qa/acl/card.mock.md");
    }

    #[test]
    fn test_configure_disables_and_overrides() {
        let mut config = RulesConfig::default();
        config.disabled.push("id-format".to_string());
        config
            .severity
            .insert("ui-state-marker".to_string(), Severity::Warning);

        let builtin = RuleSet::builtin();
        let rules = builtin.configure(&config).unwrap();
        assert_eq!(rules.len(), builtin.len() - 1);
        assert!(rules.get("id-format").is_none());
        assert_eq!(rules.get("ui-state-marker").unwrap().severity, Severity::Warning);
    }

    #[test]
    fn test_configure_rejects_unknown_rule() {
        let mut config = RulesConfig::default();
        config.disabled.push("no-such-rule".to_string());
        assert!(matches!(
            RuleSet::builtin().configure(&config),
            Err(Error::Config(_))
        ));
    }
}
