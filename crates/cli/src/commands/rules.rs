//! Rule listing

use scriptcheck_common::ValidatorConfig;

use crate::output::{self, OutputFormat};

/// Print the rules a run with `config` would evaluate
pub fn execute(config: ValidatorConfig, format: OutputFormat) -> anyhow::Result<u8> {
    let validator = scriptcheck_common::Validator::new(config)?;
    print!("{}", output::render_rules(validator.rules(), format)?);
    Ok(0)
}
