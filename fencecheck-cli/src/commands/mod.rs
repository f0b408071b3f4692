//! Command handlers -- one module per subcommand

pub mod config;
pub mod list;
pub mod run;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use fencecheck_conformance::{Scenario, load_scenarios_from_dir, standard_scenarios};
use fencecheck_core::config::FencecheckConfig;

use crate::error::CliError;

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "fencecheck.toml";

/// Effective configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Parsed configuration (file + env overrides + defaults).
    pub config: FencecheckConfig,
    /// Human-readable source description.
    pub source: String,
}

/// Resolve the configuration file path.
///
/// An explicit path is always used. Without one, `fencecheck.toml` in the
/// working directory is used if present.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.is_file().then_some(default)
        }
    }
}

/// Load the effective configuration.
///
/// Falls back to defaults plus environment overrides when no file is found
/// and none was requested explicitly.
pub async fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, CliError> {
    match resolve_config_path(explicit) {
        Some(path) => {
            let config = FencecheckConfig::load(&path).await?;
            Ok(LoadedConfig {
                config,
                source: path.display().to_string(),
            })
        }
        None => {
            let mut config = FencecheckConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(LoadedConfig {
                config,
                source: "defaults".to_owned(),
            })
        }
    }
}

/// Where a scenario definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioSource {
    /// Built-in catalog.
    Builtin,
    /// TOML file under `scenario.scenario_dir`.
    File,
}

/// Collect the built-in catalog followed by scenarios from `scenario_dir`.
///
/// File scenarios whose name collides with a built-in one are skipped.
pub fn collect_scenarios(
    config: &FencecheckConfig,
) -> Result<Vec<(Scenario, ScenarioSource)>, CliError> {
    let mut scenarios: Vec<_> = standard_scenarios()
        .into_iter()
        .map(|s| (s, ScenarioSource::Builtin))
        .collect();

    let dir = config.scenario.scenario_dir.trim();
    if dir.is_empty() {
        return Ok(scenarios);
    }

    let loaded = load_scenarios_from_dir(Path::new(dir))?;
    debug!(dir, count = loaded.len(), "loaded scenario files");
    for scenario in loaded {
        if scenarios.iter().any(|(s, _)| s.name == scenario.name) {
            warn!(
                scenario = %scenario.name,
                dir,
                "scenario file shadows a built-in scenario, skipping"
            );
            continue;
        }
        scenarios.push((scenario, ScenarioSource::File));
    }

    Ok(scenarios)
}
