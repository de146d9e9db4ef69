//! CLI Commands

pub mod check;
pub mod rules;

use std::path::{Path, PathBuf};

use anyhow::Context;
use scriptcheck_common::{ValidatorConfig, DEFAULT_CONFIG_FILE};
use tracing::debug;

/// Load the run configuration.
///
/// An explicit `--config` file must exist; otherwise `scriptcheck.toml` in
/// the working directory is used when present.
pub fn load_config(path: Option<&Path>, jobs: Option<usize>) -> anyhow::Result<ValidatorConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            debug!("Loading config from {}", path.display());
            ValidatorConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            ValidatorConfig::load(&default)
                .with_context(|| format!("failed to load {}", default.display()))?
        }
    };

    if jobs.is_some() {
        config.jobs = jobs;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("missing.toml")), None).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_jobs_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptcheck.toml");
        std::fs::write(&path, "jobs = 8\n[report]\nfail_on_warnings = true\n").unwrap();

        let config = load_config(Some(&path), Some(2)).unwrap();
        assert_eq!(config.jobs, Some(2));
        assert!(config.report.fail_on_warnings);

        assert!(load_config(Some(&path), Some(0)).is_err());
    }
}
