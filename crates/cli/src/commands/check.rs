//! Validation command

use std::path::PathBuf;

use scriptcheck_common::{Validator, ValidatorConfig};
use tracing::debug;

use crate::output::{self, OutputFormat};

/// Validate `paths` and print the report; returns the process exit code
pub async fn execute(
    paths: Vec<PathBuf>,
    config: ValidatorConfig,
    format: OutputFormat,
    strict: bool,
) -> anyhow::Result<u8> {
    let validator = Validator::new(config)?;
    let report = validator.validate(&paths).await?;
    let outcome = report.outcome(validator.failure_policy(strict));

    match format {
        OutputFormat::Text => print!("{}", output::render_text(&report, outcome)),
        OutputFormat::Json => print!("{}", output::render_json(&report)?),
    }

    debug!(
        "Checked {} document(s) in {} feature(s)",
        report.documents, report.features
    );
    Ok(outcome.exit_code())
}
