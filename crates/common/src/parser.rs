//! Test-script document parser
//!
//! Turns the semi-structured markdown of a test-script document into a
//! [`TestScriptDocument`]. Parsing is tolerant: structural problems are
//! collected as `ParseError` diagnostics and scanning carries on, so one
//! pass reports every structural defect in the file. A document is only
//! produced when no such problem was found.
//!
//! ```text
//! # Test Case: ACL-001 - Admin can open the access card
//! ## Prerequisites            (required)
//! ## Setup Scripts            (optional)
//! ## Starting URL             (optional)
//! ## Test Steps               (required)
//! ## Expected UI State        (required)
//! ## Expected Result          (required)
//! ## Screenshots              (optional)
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MarkerConfig;
use crate::model::{
    display_path, Diagnostic, ExpectedResult, Marker, Mode, Prerequisite, ScreenshotPlaceholder,
    Section, SetupScript, StartingUrl, Step, TestCase, TestScriptDocument, UiStateEntry,
};
use crate::scan::feature_name;

/// Opening delimiter of a screenshot placeholder
pub const PLACEHOLDER_OPEN: &str = "<screenshot:";

const TEST_CASE_LABEL: &str = "Test Case:";

static STEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)[.)](?:\s+(.*))?$").expect("step pattern"));

static BOLD_ELEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\*(.+?)\*\*\s*:?\s*(.*)$").expect("element pattern"));

static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*+]|[0-9]+[.)])\s+").expect("list item pattern"));

/// Lines collected under one section heading
#[derive(Debug)]
struct SectionBuffer {
    heading_line: usize,
    lines: Vec<(usize, String)>,
}

impl SectionBuffer {
    /// Last non-blank line of the section, or its heading when empty
    fn last_line(&self) -> usize {
        self.lines
            .iter()
            .rev()
            .find(|(_, l)| !l.trim().is_empty())
            .map(|(n, _)| *n)
            .unwrap_or(self.heading_line)
    }

    fn non_blank(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .map(|(n, l)| (*n, l.as_str()))
            .filter(|(_, l)| !l.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Before the `Test Case:` heading
    Preamble,
    /// After the heading, before the first section
    Heading,
    Section(Section),
}

struct Heading {
    id: String,
    name: String,
    line: usize,
}

struct DocumentParser<'a> {
    file: String,
    markers: &'a MarkerConfig,
    errors: Vec<Diagnostic>,
    heading: Option<Heading>,
    cursor: Cursor,
    furthest: Option<Section>,
    sections: BTreeMap<Section, SectionBuffer>,
    screenshots: Vec<ScreenshotPlaceholder>,
    preamble_reported: bool,
    stray_reported: bool,
    unclosed_fence: bool,
}

/// Parse one document.
///
/// Returns the document, or every `ParseError` found in it (never empty).
pub fn parse_document(
    path: &Path,
    text: &str,
    markers: &MarkerConfig,
) -> Result<TestScriptDocument, Vec<Diagnostic>> {
    let file = display_path(path);
    let mode = Mode::from_path(path);
    let feature = feature_name(path);

    let mut parser = DocumentParser {
        file: file.clone(),
        markers,
        errors: Vec::new(),
        heading: None,
        cursor: Cursor::Preamble,
        furthest: None,
        sections: BTreeMap::new(),
        screenshots: Vec::new(),
        preamble_reported: false,
        stray_reported: false,
        unclosed_fence: false,
    };

    if mode.is_none() {
        parser.error(None, "filename-mode", "file name must end in .mock.md or .full.md");
    }

    parser.scan_lines(text);
    let test_case = parser.finish();

    let mut errors = parser.errors;
    match (test_case, mode) {
        (Some(test_case), Some(mode)) if errors.is_empty() => Ok(TestScriptDocument {
            path: path.to_path_buf(),
            feature,
            mode,
            test_cases: vec![test_case],
            source: text.to_string(),
        }),
        _ => {
            errors.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            Err(errors)
        }
    }
}

impl<'a> DocumentParser<'a> {
    fn error(&mut self, line: Option<usize>, rule_id: &str, message: impl Into<String>) {
        self.errors
            .push(Diagnostic::parse_error(self.file.clone(), line, rule_id, message));
    }

    fn scan_lines(&mut self, text: &str) {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        // Line of the currently open code fence
        let mut fence: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            self.scan_placeholders(raw, line_no);

            if raw.trim_start().starts_with("```") {
                fence = match fence {
                    Some(_) => None,
                    None => Some(line_no),
                };
                self.content(raw, line_no);
                continue;
            }

            if fence.is_none() {
                if let Some(heading) = heading_text(raw) {
                    if self.open_heading(heading, line_no) {
                        continue;
                    }
                }
            }

            self.content(raw, line_no);
        }

        if let Some(line) = fence {
            self.unclosed_fence = true;
            self.error(
                Some(line),
                "unclosed-fence",
                "code fence is never closed; the rest of the file is swallowed by it",
            );
        }
    }

    /// Handle a markdown heading. Returns false when it is not one of ours,
    /// in which case the line is ordinary content.
    fn open_heading(&mut self, heading: &str, line_no: usize) -> bool {
        if let Some(rest) = heading.strip_prefix(TEST_CASE_LABEL) {
            if self.heading.is_some() {
                self.error(
                    Some(line_no),
                    "multiple-test-cases",
                    "multiple test cases per file; a document holds exactly one test case",
                );
            } else {
                let (id, name) = split_id_and_name(rest);
                self.heading = Some(Heading {
                    id,
                    name,
                    line: line_no,
                });
                self.cursor = Cursor::Heading;
            }
            return true;
        }

        let Some(section) = Section::from_label(heading.trim_end_matches(':').trim_end()) else {
            return false;
        };

        if self.cursor == Cursor::Preamble {
            self.preamble(line_no);
            return true;
        }

        if self.sections.contains_key(&section) {
            self.error(
                Some(line_no),
                "section-order",
                format!("section '{}' repeated", section.label()),
            );
        } else if matches!(self.furthest, Some(furthest) if section < furthest) {
            self.error(
                Some(line_no),
                "section-order",
                format!("section '{}' out of order", section.label()),
            );
        }

        self.furthest = self.furthest.max(Some(section));
        self.sections.entry(section).or_insert_with(|| SectionBuffer {
            heading_line: line_no,
            lines: Vec::new(),
        });
        self.cursor = Cursor::Section(section);
        true
    }

    fn content(&mut self, raw: &str, line_no: usize) {
        match self.cursor {
            Cursor::Preamble => {
                if !raw.trim().is_empty() {
                    self.preamble(line_no);
                }
            }
            Cursor::Heading => {
                if !raw.trim().is_empty() && !self.stray_reported {
                    self.stray_reported = true;
                    self.error(
                        Some(line_no),
                        "stray-content",
                        "text between the Test Case heading and the first section",
                    );
                }
            }
            Cursor::Section(section) => {
                if let Some(buffer) = self.sections.get_mut(&section) {
                    buffer.lines.push((line_no, raw.to_string()));
                }
            }
        }
    }

    fn preamble(&mut self, line_no: usize) {
        if !self.preamble_reported {
            self.preamble_reported = true;
            self.error(
                Some(line_no),
                "content-before-heading",
                "content before the 'Test Case:' heading",
            );
        }
    }

    fn scan_placeholders(&mut self, raw: &str, line_no: usize) {
        let mut rest = raw;
        while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
            let after = &rest[start + PLACEHOLDER_OPEN.len()..];
            let Some(end) = after.find('>') else {
                self.error(
                    Some(line_no),
                    "placeholder-syntax",
                    "unbalanced screenshot placeholder: missing closing '>'",
                );
                return;
            };
            let inner = &after[..end];
            rest = &after[end + 1..];

            if inner.contains('<') {
                self.error(
                    Some(line_no),
                    "placeholder-syntax",
                    "unbalanced screenshot placeholder: '<' inside placeholder",
                );
                continue;
            }
            match inner.split_once('|') {
                None => self.error(
                    Some(line_no),
                    "placeholder-syntax",
                    format!("screenshot placeholder '{}' is missing the '|' separator", inner),
                ),
                Some((path, _)) if path.trim().is_empty() => self.error(
                    Some(line_no),
                    "placeholder-syntax",
                    "screenshot placeholder has an empty path",
                ),
                Some((path, description)) => self.screenshots.push(ScreenshotPlaceholder {
                    path: path.trim().to_string(),
                    description: description.trim().to_string(),
                    line: line_no,
                }),
            }
        }
    }

    /// Close the document: check required sections and build the test case
    fn finish(&mut self) -> Option<TestCase> {
        let Some(heading) = self.heading.take() else {
            // Nothing else is meaningful without the heading
            self.errors.retain(|e| e.rule_id == "filename-mode");
            self.error(
                None,
                "missing-test-case",
                "no 'Test Case:' heading found",
            );
            return None;
        };

        for section in Section::ALL {
            // Sections hidden inside an unclosed fence are already explained
            if self.unclosed_fence || !section.is_required() || self.sections.contains_key(&section) {
                continue;
            }
            let (previous, line) = Section::ALL[..section.index()]
                .iter()
                .rev()
                .find_map(|s| self.sections.get(s).map(|b| (s.label(), b.last_line())))
                .unwrap_or(("Test Case", heading.line));
            self.error(
                Some(line),
                "missing-section",
                format!(
                    "missing required section '{}' (expected after '{}', which ends at line {})",
                    section.label(),
                    previous,
                    line
                ),
            );
        }

        let prerequisites = self.prerequisites();
        let setup_script = self.setup_script();
        let starting_url = self.starting_url();
        let steps = self.steps();
        let expected_ui_state = self.ui_state();
        let expected_result = self.expected_result(heading.line);

        Some(TestCase {
            id: heading.id,
            name: heading.name,
            line: heading.line,
            prerequisites,
            setup_script,
            starting_url,
            steps,
            expected_ui_state,
            expected_result,
            screenshots: std::mem::take(&mut self.screenshots),
        })
    }

    fn prerequisites(&self) -> Vec<Prerequisite> {
        let Some(buffer) = self.sections.get(&Section::Prerequisites) else {
            return Vec::new();
        };
        buffer
            .non_blank()
            .map(|(line, text)| Prerequisite {
                text: strip_list_marker(text).to_string(),
                line,
            })
            .collect()
    }

    fn setup_script(&self) -> Option<SetupScript> {
        let buffer = self.sections.get(&Section::SetupScripts)?;
        let text = buffer
            .lines
            .iter()
            .map(|(_, l)| l.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(SetupScript {
            text: text.to_string(),
            line: buffer.heading_line,
        })
    }

    fn starting_url(&mut self) -> Option<StartingUrl> {
        let buffer = self.sections.get(&Section::StartingUrl)?;
        let lines: Vec<(usize, String)> = buffer
            .non_blank()
            .map(|(n, l)| (n, l.to_string()))
            .collect();

        if lines.len() > 1 {
            self.error(
                Some(lines[1].0),
                "starting-url",
                "Starting URL must be a single line",
            );
        }
        let (line, text) = lines.into_iter().next()?;
        let url = strip_list_marker(&text)
            .trim_matches(|c| c == '`' || c == '<' || c == '>')
            .trim()
            .to_string();
        Some(StartingUrl { url, line })
    }

    fn steps(&mut self) -> Vec<Step> {
        let Some(buffer) = self.sections.get(&Section::TestSteps) else {
            return Vec::new();
        };

        let mut steps: Vec<Step> = Vec::new();
        let mut orphan_line = None;
        for (line, text) in buffer.non_blank() {
            let trimmed = text.trim();
            if let Some(caps) = STEP_RE.captures(trimmed) {
                steps.push(Step {
                    number: caps[1].parse().unwrap_or(0),
                    text: caps.get(2).map(|m| m.as_str().trim()).unwrap_or("").to_string(),
                    line,
                });
            } else if let Some(step) = steps.last_mut() {
                if !step.text.is_empty() {
                    step.text.push(' ');
                }
                step.text.push_str(strip_list_marker(trimmed));
            } else if orphan_line.is_none() {
                orphan_line = Some(line);
            }
        }

        if let Some(line) = orphan_line {
            self.error(
                Some(line),
                "step-syntax",
                "text before the first numbered step",
            );
        }
        steps
    }

    fn ui_state(&self) -> Vec<UiStateEntry> {
        let Some(buffer) = self.sections.get(&Section::ExpectedUiState) else {
            return Vec::new();
        };
        buffer
            .non_blank()
            .map(|(line, text)| parse_ui_state_line(strip_list_marker(text.trim()), line, self.markers))
            .collect()
    }

    fn expected_result(&self, fallback_line: usize) -> ExpectedResult {
        match self.sections.get(&Section::ExpectedResult) {
            Some(buffer) => ExpectedResult {
                text: buffer
                    .non_blank()
                    .map(|(_, l)| l.trim())
                    .collect::<Vec<_>>()
                    .join(" "),
                line: buffer.heading_line,
            },
            None => ExpectedResult {
                text: String::new(),
                line: fallback_line,
            },
        }
    }
}

/// Heading text of a markdown `#` line, without the hashes
fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let rest = trimmed.trim_start_matches('#');
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

fn split_id_and_name(rest: &str) -> (String, String) {
    let rest = rest.trim();
    let (id, name) = match rest.split_once(char::is_whitespace) {
        Some((id, name)) => (id, name),
        None => (rest, ""),
    };
    let name = name
        .trim_start()
        .trim_start_matches(['-', '–', '—', ':'])
        .trim();
    (id.trim_end_matches(':').to_string(), name.to_string())
}

fn strip_list_marker(text: &str) -> &str {
    let trimmed = text.trim();
    match LIST_ITEM_RE.find(trimmed) {
        Some(m) => trimmed[m.end()..].trim(),
        None => trimmed,
    }
}

fn parse_ui_state_line(text: &str, line: usize, markers: &MarkerConfig) -> UiStateEntry {
    let (marker, rest) = match_marker(text, markers);
    let rest = rest.trim();

    let (element, description) = if let Some(caps) = BOLD_ELEMENT_RE.captures(rest) {
        (caps[1].trim().to_string(), caps[2].trim().to_string())
    } else if let Some((element, description)) = rest.split_once(':') {
        (element.trim().to_string(), description.trim().to_string())
    } else {
        (rest.to_string(), String::new())
    };

    UiStateEntry {
        marker,
        element,
        description,
        line,
    }
}

fn match_marker<'t>(text: &'t str, markers: &MarkerConfig) -> (Option<Marker>, &'t str) {
    for glyph in &markers.present {
        if let Some(rest) = text.strip_prefix(glyph.as_str()) {
            return (Some(Marker::Present), rest);
        }
    }
    for glyph in &markers.absent {
        if let Some(rest) = text.strip_prefix(glyph.as_str()) {
            return (Some(Marker::Absent), rest);
        }
    }
    (None, text)
}
