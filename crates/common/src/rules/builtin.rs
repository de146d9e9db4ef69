//! Built-in rules

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Finding, RuleContext, RuleDescriptor};
use crate::model::{Mode, ScreenshotPath, Severity, TestScriptDocument};

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]+-[0-9]{3,}$").expect("id pattern"));

pub(super) fn descriptors() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            id: "id-format",
            severity: Severity::Error,
            summary: "test case id matches UPPER-###",
            check: id_format,
        },
        RuleDescriptor {
            id: "id-prefix-matches-feature",
            severity: Severity::Error,
            summary: "test case id prefix equals the feature code",
            check: id_prefix_matches_feature,
        },
        RuleDescriptor {
            id: "name-nonempty",
            severity: Severity::Warning,
            summary: "test case heading carries a name after the id",
            check: name_nonempty,
        },
        RuleDescriptor {
            id: "prerequisites-nonempty",
            severity: Severity::Warning,
            summary: "at least one prerequisite is listed",
            check: prerequisites_nonempty,
        },
        RuleDescriptor {
            id: "starting-url-format",
            severity: Severity::Warning,
            summary: "starting URL is absolute or root-relative",
            check: starting_url_format,
        },
        RuleDescriptor {
            id: "steps-nonempty",
            severity: Severity::Error,
            summary: "at least one test step",
            check: steps_nonempty,
        },
        RuleDescriptor {
            id: "step-numbering",
            severity: Severity::Warning,
            summary: "steps are numbered 1..n without gaps",
            check: step_numbering,
        },
        RuleDescriptor {
            id: "ui-state-marker",
            severity: Severity::Error,
            summary: "every Expected UI State line starts with a present/absent marker",
            check: ui_state_marker,
        },
        RuleDescriptor {
            id: "ui-state-nonempty",
            severity: Severity::Warning,
            summary: "at least one Expected UI State entry",
            check: ui_state_nonempty,
        },
        RuleDescriptor {
            id: "expected-result-nonempty",
            severity: Severity::Warning,
            summary: "expected result is present and does not repeat the steps",
            check: expected_result_nonempty,
        },
        RuleDescriptor {
            id: "screenshot-path-shape",
            severity: Severity::Error,
            summary: "placeholder path is qa/<feature>/screenshots/<id>_<step>-<element>.png",
            check: screenshot_path_shape,
        },
        RuleDescriptor {
            id: "screenshot-feature-match",
            severity: Severity::Error,
            summary: "placeholder feature segment equals the document feature",
            check: screenshot_feature_match,
        },
        RuleDescriptor {
            id: "screenshot-step-exists",
            severity: Severity::Warning,
            summary: "placeholder step number refers to an existing step",
            check: screenshot_step_exists,
        },
        RuleDescriptor {
            id: "mode-exclusivity",
            severity: Severity::Error,
            summary: "body carries no marker of the opposite mode",
            check: mode_exclusivity,
        },
        RuleDescriptor {
            id: "single-scenario-heuristic",
            severity: Severity::Warning,
            summary: "prerequisites and steps do not mix several roles",
            check: single_scenario_heuristic,
        },
    ]
}

fn id_format(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    doc.test_cases
        .iter()
        .filter(|tc| !ID_RE.is_match(&tc.id))
        .map(|tc| {
            Finding::at(
                tc.line,
                format!("test case id '{}' does not match UPPER-### (e.g. ACL-001)", tc.id),
            )
        })
        .collect()
}

fn id_prefix_matches_feature(ctx: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    let expected = ctx.config.features.prefix_for(&doc.feature);
    doc.test_cases
        .iter()
        .filter_map(|tc| {
            let prefix = tc.id.split_once('-').map(|(p, _)| p).unwrap_or(&tc.id);
            (prefix != expected).then(|| {
                Finding::at(
                    tc.line,
                    format!(
                        "test case id prefix '{}' does not match feature '{}' (expected '{}')",
                        prefix, doc.feature, expected
                    ),
                )
            })
        })
        .collect()
}

fn name_nonempty(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    doc.test_cases
        .iter()
        .filter(|tc| tc.name.trim().is_empty())
        .map(|tc| Finding::at(tc.line, format!("test case '{}' has no name", tc.id)))
        .collect()
}

fn prerequisites_nonempty(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    doc.test_cases
        .iter()
        .filter(|tc| tc.prerequisites.is_empty())
        .map(|tc| Finding::at(tc.line, "no prerequisites listed"))
        .collect()
}

fn starting_url_format(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    doc.test_cases
        .iter()
        .filter_map(|tc| tc.starting_url.as_ref())
        .filter(|url| {
            !(url.url.starts_with("http://") || url.url.starts_with("https://") || url.url.starts_with('/'))
        })
        .map(|url| {
            Finding::at(
                url.line,
                format!("starting URL '{}' is neither absolute (http/https) nor root-relative", url.url),
            )
        })
        .collect()
}

fn steps_nonempty(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    doc.test_cases
        .iter()
        .filter(|tc| tc.steps.is_empty())
        .map(|tc| Finding::at(tc.line, "Test Steps section lists no numbered steps"))
        .collect()
}

fn step_numbering(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    doc.test_cases
        .iter()
        .filter_map(|tc| {
            tc.steps
                .iter()
                .zip(1u32..)
                .find(|(step, expected)| step.number != *expected)
                .map(|(step, expected)| {
                    Finding::at(
                        step.line,
                        format!("step numbered {}, expected {}", step.number, expected),
                    )
                })
        })
        .collect()
}

fn ui_state_marker(ctx: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    let markers = &ctx.config.markers;
    let glyphs = format!(
        "present ({}) or absent ({})",
        markers.present.join(" "),
        markers.absent.join(" ")
    );
    doc.test_cases
        .iter()
        .flat_map(|tc| &tc.expected_ui_state)
        .filter(|entry| entry.marker.is_none())
        .map(|entry| {
            Finding::at(
                entry.line,
                format!("Expected UI State line '{}' does not start with a {} marker", entry.element, glyphs),
            )
        })
        .collect()
}

fn ui_state_nonempty(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    doc.test_cases
        .iter()
        .filter(|tc| tc.expected_ui_state.is_empty())
        .map(|tc| Finding::at(tc.line, "Expected UI State section has no entries"))
        .collect()
}

/// Lower-case, whitespace-collapsed text without trailing punctuation
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!'])
        .to_lowercase()
}

fn expected_result_nonempty(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    let mut findings = Vec::new();
    for tc in &doc.test_cases {
        let result = normalize(&tc.expected_result.text);
        if result.is_empty() {
            findings.push(Finding::at(tc.expected_result.line, "Expected Result is empty"));
            continue;
        }

        let all_steps = normalize(
            &tc.steps
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        );
        if let Some(step) = tc.steps.iter().find(|s| normalize(&s.text) == result) {
            findings.push(Finding::at(
                tc.expected_result.line,
                format!("Expected Result repeats step {} verbatim", step.number),
            ));
        } else if result == all_steps {
            findings.push(Finding::at(
                tc.expected_result.line,
                "Expected Result repeats the test steps verbatim",
            ));
        }
    }
    findings
}

fn screenshot_path_shape(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    let mut findings = Vec::new();
    for tc in &doc.test_cases {
        for shot in &tc.screenshots {
            match ScreenshotPath::parse(&shot.path) {
                None => findings.push(Finding::at(
                    shot.line,
                    format!(
                        "screenshot path '{}' does not match qa/<feature>/screenshots/<id>_<step>-<element>.png",
                        shot.path
                    ),
                )),
                Some(parsed) if parsed.test_id != tc.id => findings.push(Finding::at(
                    shot.line,
                    format!(
                        "screenshot path '{}' names test '{}' but the test case id is '{}'",
                        shot.path, parsed.test_id, tc.id
                    ),
                )),
                Some(_) => {}
            }
        }
    }
    findings
}

fn screenshot_feature_match(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    doc.test_cases
        .iter()
        .flat_map(|tc| &tc.screenshots)
        .filter_map(|shot| {
            let feature = ScreenshotPath::feature_segment(&shot.path)?;
            (feature != doc.feature).then(|| {
                Finding::at(
                    shot.line,
                    format!(
                        "screenshot path '{}' belongs to feature '{}' but the document is in feature '{}' ({} != {})",
                        shot.path, feature, doc.feature, feature, doc.feature
                    ),
                )
            })
        })
        .collect()
}

fn screenshot_step_exists(_: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    let mut findings = Vec::new();
    for tc in &doc.test_cases {
        for shot in &tc.screenshots {
            let Some(parsed) = ScreenshotPath::parse(&shot.path) else {
                continue;
            };
            if !tc.steps.iter().any(|s| s.number == parsed.step) {
                findings.push(Finding::at(
                    shot.line,
                    format!(
                        "screenshot '{}' refers to step {}, which does not exist",
                        shot.path, parsed.step
                    ),
                ));
            }
        }
    }
    findings
}

fn mode_exclusivity(ctx: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    let opposite = doc.mode.opposite();
    let markers: Vec<String> = match opposite {
        Mode::Mock => &ctx.config.modes.mock_markers,
        Mode::Full => &ctx.config.modes.full_markers,
    }
    .iter()
    .map(|m| m.to_lowercase())
    .collect();

    let mut hits = doc.lines().filter_map(|(line, text)| {
        let lower = text.to_lowercase();
        markers
            .iter()
            .find(|m| lower.contains(m.as_str()))
            .map(|m| (line, m.clone()))
    });

    let Some((line, marker)) = hits.next() else {
        return Vec::new();
    };
    let more = hits.count();
    let mut message = format!(
        "{} document contains {}-mode marker '{}'",
        doc.mode, opposite, marker
    );
    if more > 0 {
        message.push_str(&format!(" (and {} more line(s))", more));
    }
    vec![Finding::at(line, message)]
}

fn single_scenario_heuristic(ctx: &RuleContext<'_>, doc: &TestScriptDocument) -> Vec<Finding> {
    let heuristics = &ctx.config.heuristics;
    let keywords: Vec<String> = heuristics.role_keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut findings = Vec::new();
    for tc in &doc.test_cases {
        let texts = std::iter::once(tc.name.as_str())
            .chain(tc.prerequisites.iter().map(|p| p.text.as_str()))
            .chain(tc.steps.iter().map(|s| s.text.as_str()));

        let mut roles = BTreeSet::new();
        for text in texts {
            for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
                let word = word.to_lowercase();
                let singular = word.strip_suffix('s').unwrap_or(&word);
                if let Some(role) = keywords.iter().find(|k| **k == word || *k == singular) {
                    roles.insert(role.clone());
                }
            }
        }

        if roles.len() >= heuristics.role_threshold {
            findings.push(Finding::at(
                tc.line,
                format!(
                    "mentions {} distinct roles ({}); a document should describe one scenario",
                    roles.len(),
                    roles.into_iter().collect::<Vec<_>>().join(", ")
                ),
            ));
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::config::{MarkerConfig, ValidatorConfig};
    use crate::parser::parse_document;

    fn doc(path: &str, id: &str, steps: &str, ui: &str, result: &str, extra: &str) -> TestScriptDocument {
        let text = format!(
            "# Test Case: {id} - Scenario\n## Prerequisites\n- Signed in\n## Test Steps\n{steps}\n## Expected UI State\n{ui}\n## Expected Result\n{result}\n## Screenshots\n{extra}\n"
        );
        parse_document(Path::new(path), &text, &MarkerConfig::default()).unwrap()
    }

    fn run(check: fn(&RuleContext<'_>, &TestScriptDocument) -> Vec<Finding>, doc: &TestScriptDocument) -> Vec<Finding> {
        let config = ValidatorConfig::default();
        check(&RuleContext { config: &config }, doc)
    }

    fn basic(path: &str, id: &str) -> TestScriptDocument {
        doc(
            path,
            id,
            "1. Open the page\n2. Click save\n3. Open the card",
            "- ✅ **Card**: Visible",
            "The card is saved.",
            "",
        )
    }

    #[test]
    fn test_id_format() {
        assert!(run(id_format, &basic("qa/acl/a.mock.md", "ACL-001")).is_empty());
        assert_eq!(run(id_format, &basic("qa/acl/a.mock.md", "ACL-01")).len(), 1);
        assert_eq!(run(id_format, &basic("qa/acl/a.mock.md", "acl-001")).len(), 1);
    }

    #[test]
    fn test_empty_parts_of_the_heading_and_sections() {
        let text = "\
# Test Case: ACL-001
## Prerequisites
## Test Steps
## Expected UI State
## Expected Result
The card is saved.
";
        let bare = parse_document(Path::new("qa/acl/a.mock.md"), text, &MarkerConfig::default()).unwrap();
        let filled = basic("qa/acl/a.mock.md", "ACL-001");

        let checks: [crate::rules::CheckFn; 4] =
            [name_nonempty, prerequisites_nonempty, steps_nonempty, ui_state_nonempty];
        for check in checks {
            let findings = run(check, &bare);
            assert_eq!(findings.len(), 1, "{:?}", findings);
            assert_eq!(findings[0].line, Some(1));
            assert!(run(check, &filled).is_empty());
        }
        assert!(run(name_nonempty, &bare)[0].message.contains("'ACL-001' has no name"));
    }

    #[test]
    fn test_id_prefix_matches_feature() {
        assert!(run(id_prefix_matches_feature, &basic("qa/acl/a.mock.md", "ACL-001")).is_empty());
        let findings = run(id_prefix_matches_feature, &basic("qa/auth/a.mock.md", "ACL-001"));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("'AUTH'"));
    }

    #[test]
    fn test_step_numbering_gap() {
        let d = doc(
            "qa/acl/a.mock.md",
            "ACL-001",
            "1. One\n2. Two\n4. Four",
            "- ✅ **Card**: Visible",
            "Done.",
            "",
        );
        let findings = run(step_numbering, &d);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "step numbered 4, expected 3");
    }

    #[test]
    fn test_expected_result_repeating_a_step() {
        let d = doc(
            "qa/acl/a.mock.md",
            "ACL-001",
            "1. Open the page\n2. Click save",
            "- ✅ **Card**: Visible",
            "Click save.",
            "",
        );
        let findings = run(expected_result_nonempty, &d);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("step 2"));
    }

    #[test]
    fn test_ui_state_marker_flags_only_unmarked_lines() {
        let d = doc(
            "qa/acl/a.mock.md",
            "ACL-001",
            "1. Open the page",
            "- ✅ **Card**: Visible\n**Resend Button**: Visible\n- ❌ **Banner**: Hidden",
            "Card shown.",
            "",
        );
        let findings = run(ui_state_marker, &d);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, Some(8));
        assert!(findings[0].message.contains("Resend Button"));
    }

    #[test]
    fn test_screenshot_rules() {
        let shot = "- <screenshot:qa/acl/screenshots/ACL-001_03-card.png|Card>";
        let good = doc(
            "qa/acl/admin-access.mock.md",
            "ACL-001",
            "1. a\n2. b\n3. c",
            "- ✅ **Card**: Visible",
            "Card shown.",
            shot,
        );
        assert!(run(screenshot_path_shape, &good).is_empty());
        assert!(run(screenshot_feature_match, &good).is_empty());
        assert!(run(screenshot_step_exists, &good).is_empty());

        let moved = doc(
            "qa/auth/login.mock.md",
            "AUTH-001",
            "1. a",
            "- ✅ **Card**: Visible",
            "Card shown.",
            shot,
        );
        let findings = run(screenshot_feature_match, &moved);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("acl != auth"));
        assert_eq!(run(screenshot_step_exists, &moved).len(), 1);
    }

    #[test]
    fn test_screenshot_path_shape_malformed() {
        let d = doc(
            "qa/acl/a.mock.md",
            "ACL-001",
            "1. a",
            "- ✅ **Card**: Visible",
            "Card shown.",
            "- <screenshot:screens/card.png|Card>",
        );
        let findings = run(screenshot_path_shape, &d);
        assert_eq!(findings.len(), 1);
        // no qa/<feature> segment to compare
        assert!(run(screenshot_feature_match, &d).is_empty());
    }

    #[test]
    fn test_mode_exclusivity_reports_once() {
        let d = doc(
            "qa/acl/admin-access.full.md",
            "ACL-001",
            "1. Start the mock server\n2. Point the app at the mocked API",
            "- ✅ **Card**: Visible",
            "Card shown.",
            "",
        );
        let findings = run(mode_exclusivity, &d);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("full document contains mock-mode marker"));
        assert!(findings[0].message.contains("1 more"));

        let mock = basic("qa/acl/admin-access.mock.md", "ACL-001");
        assert!(run(mode_exclusivity, &mock).is_empty());
    }

    #[test]
    fn test_single_scenario_heuristic() {
        let d = doc(
            "qa/acl/a.mock.md",
            "ACL-001",
            "1. Sign in as an admin\n2. Switch to a viewer account",
            "- ✅ **Card**: Visible",
            "Card shown.",
            "",
        );
        let findings = run(single_scenario_heuristic, &d);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("admin, viewer"));

        assert!(run(single_scenario_heuristic, &basic("qa/acl/a.mock.md", "ACL-001")).is_empty());
    }

    #[test]
    fn test_starting_url_format() {
        let text = "# Test Case: ACL-001 - x\n## Prerequisites\n- a\n## Starting URL\nlocalhost:3000\n## Test Steps\n1. a\n## Expected UI State\n- ✅ **A**: b\n## Expected Result\nok\n";
        let d = parse_document(Path::new("qa/acl/a.mock.md"), text, &MarkerConfig::default()).unwrap();
        assert_eq!(run(starting_url_format, &d).len(), 1);
    }
}
