//! Output formatting for CLI

use std::fmt::Write as _;

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use scriptcheck_common::{Diagnostic, Outcome, Report, RuleSet, Severity};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable, grouped by file
    #[default]
    Text,
    /// JSON array of diagnostics
    Json,
}

fn severity_label(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Error => severity.as_str().red().bold(),
        Severity::Warning => severity.as_str().yellow().bold(),
        Severity::Info => severity.as_str().blue(),
    }
}

fn diagnostic_line(d: &Diagnostic) -> String {
    let line = d.line.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string());
    format!(
        "  {}: {}[{}] {}",
        line,
        severity_label(d.severity),
        d.rule_id.dimmed(),
        d.message
    )
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

/// Render a report for humans
pub fn render_text(report: &Report, outcome: Outcome) -> String {
    let mut out = String::new();

    for (file, diagnostics) in report.by_file() {
        let _ = writeln!(out, "{}", file.bold());
        for d in diagnostics {
            let _ = writeln!(out, "{}", diagnostic_line(d));
        }
        out.push('\n');
    }

    let summary = report.summary();
    let counts = format!(
        "{} checked: {}, {}, {} info",
        plural(report.documents, "document"),
        plural(summary.errors, "error"),
        plural(summary.warnings, "warning"),
        summary.infos
    );
    let status = match outcome {
        Outcome::Passed => format!("✅ {}", "Passed".green().bold()),
        Outcome::Failed => format!("❌ {}", "Failed".red().bold()),
        Outcome::IoFailure => format!("❌ {}", "Unreadable input".red().bold()),
    };
    let _ = writeln!(out, "{} ({})", status, counts);
    out
}

/// Render a report as a pretty JSON array
pub fn render_json(report: &Report) -> anyhow::Result<String> {
    let mut out = report.to_json()?;
    out.push('\n');
    Ok(out)
}

/// Render the active rule set
pub fn render_rules(rules: &RuleSet, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(vec!["Rule", "Severity", "Checks"]);
            for rule in rules.iter() {
                table.add_row(vec![
                    rule.id.to_string(),
                    rule.severity.to_string(),
                    rule.summary.to_string(),
                ]);
            }
            Ok(format!("{table}\n"))
        }
        OutputFormat::Json => {
            let items: Vec<_> = rules
                .iter()
                .map(|rule| {
                    serde_json::json!({
                        "id": rule.id,
                        "severity": rule.severity,
                        "summary": rule.summary,
                    })
                })
                .collect();
            let mut out = serde_json::to_string_pretty(&items)?;
            out.push('\n');
            Ok(out)
        }
    }
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}
