//! `fencecheck config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use fencecheck_conformance::HarnessConfig;
use fencecheck_core::config::FencecheckConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::commands::{load_config, resolve_config_path};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show --section`.
const SECTIONS: [&str; 4] = ["general", "cluster", "scenario", "workload"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load the configuration, run core and harness validation, and report the result.
///
/// # Errors
///
/// Returns `CliError::Config` after rendering if validation fails.
async fn execute_validate(
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let source = describe_source(config_path);
    info!(source = %source, "validating configuration");

    let errors = match load_config(config_path).await {
        Ok(loaded) => validate_harness(&loaded.config),
        Err(e) => vec![e.to_string()],
    };

    let report = ConfigValidationReport {
        source,
        valid: errors.is_empty(),
        errors,
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Harness-level checks that the core validation does not cover
/// (upper bounds on timeouts and poll interval).
fn validate_harness(config: &FencecheckConfig) -> Vec<String> {
    match HarnessConfig::from_core(config).validate() {
        Ok(()) => Vec::new(),
        Err(e) => vec![e.to_string()],
    }
}

/// Display the effective configuration (file + env overrides + defaults).
async fn execute_show(
    config_path: Option<&Path>,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let loaded = load_config(config_path).await?;
    info!(source = %loaded.source, "loaded configuration");

    let report = ConfigReport::build(&loaded.config, loaded.source, section)?;
    writer.render(&report)?;

    Ok(())
}

fn describe_source(config_path: Option<&Path>) -> String {
    resolve_config_path(config_path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_owned())
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for
/// text rendering); JSON output carries the structured `config` value instead.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path, or `defaults`
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Structured configuration for JSON output
    pub config: serde_json::Value,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl ConfigReport {
    fn build(
        config: &FencecheckConfig,
        source: String,
        section: Option<String>,
    ) -> Result<Self, CliError> {
        let (toml_result, json_value) = match section.as_deref() {
            None => (toml::to_string_pretty(config), serde_json::to_value(config)?),
            Some("general") => (
                toml::to_string_pretty(&config.general),
                serde_json::to_value(&config.general)?,
            ),
            Some("cluster") => (
                toml::to_string_pretty(&config.cluster),
                serde_json::to_value(&config.cluster)?,
            ),
            Some("scenario") => (
                toml::to_string_pretty(&config.scenario),
                serde_json::to_value(&config.scenario)?,
            ),
            Some("workload") => (
                toml::to_string_pretty(&config.workload),
                serde_json::to_value(&config.workload)?,
            ),
            Some(other) => {
                return Err(CliError::Command(format!(
                    "unknown section: {} (expected: {})",
                    other,
                    SECTIONS.join(", ")
                )));
            }
        };

        Ok(Self {
            source,
            section,
            config: json_value,
            config_toml: toml_result
                .unwrap_or_else(|e| format!("(serialization error: {})", e)),
        })
    }
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path, or `defaults`
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for error in &self.errors {
                writeln!(w, "  - {}", error)?;
            }
        }

        Ok(())
    }
}
