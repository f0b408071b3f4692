//! `fencecheck list` command handler

use std::io::Write;

use serde::Serialize;

use crate::commands::{LoadedConfig, ScenarioSource, collect_scenarios};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub async fn execute(loaded: LoadedConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let report = ScenarioListReport::from_config(&loaded)?;
    writer.render(&report)?;
    Ok(())
}

/// Available scenarios.
#[derive(Serialize)]
pub struct ScenarioListReport {
    pub total: usize,
    pub scenarios: Vec<ScenarioEntry>,
}

#[derive(Serialize)]
pub struct ScenarioEntry {
    pub name: String,
    pub description: String,
    pub source: ScenarioSource,
    pub domains: usize,
    pub probes: usize,
}

impl ScenarioListReport {
    fn from_config(loaded: &LoadedConfig) -> Result<Self, CliError> {
        let scenarios: Vec<ScenarioEntry> = collect_scenarios(&loaded.config)?
            .into_iter()
            .map(|(scenario, source)| ScenarioEntry {
                domains: scenario.domains.len(),
                probes: scenario.probes().count(),
                name: scenario.name,
                description: scenario.description,
                source,
            })
            .collect();

        Ok(Self {
            total: scenarios.len(),
            scenarios,
        })
    }
}

impl Render for ScenarioListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Scenarios ({} total)", self.total)?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<24} {:<8} {:>7} {:>6}  {}",
            "NAME", "SOURCE", "DOMAINS", "PROBES", "DESCRIPTION"
        )?;
        writeln!(w, "{}", "-".repeat(80))?;

        for entry in &self.scenarios {
            let source = match entry.source {
                ScenarioSource::Builtin => "builtin".normal(),
                ScenarioSource::File => "file".cyan(),
            };
            writeln!(
                w,
                "{:<24} {:<8} {:>7} {:>6}  {}",
                entry.name, source, entry.domains, entry.probes, entry.description
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fencecheck_core::config::FencecheckConfig;

    fn loaded(config: FencecheckConfig) -> LoadedConfig {
        LoadedConfig {
            config,
            source: "test".to_owned(),
        }
    }

    #[test]
    fn lists_builtin_catalog() {
        let report =
            ScenarioListReport::from_config(&loaded(FencecheckConfig::default())).expect("list");
        assert_eq!(report.total, report.scenarios.len());
        assert!(report.scenarios.iter().any(|s| s.name == "default-deny"));
        assert!(report.scenarios.iter().all(|s| s.probes > 0));
    }

    #[test]
    fn includes_file_scenarios() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join("extra.toml"),
            r#"
name = "extra"
description = "single allow probe"
domains = [{ alias = "a" }]
server = { domain = "a", ports = [80] }

[[steps]]
action = "probe"
client = "client-a"
domain = "a"
port = 80
expect = "allow"
"#,
        )
        .expect("write scenario");

        let mut config = FencecheckConfig::default();
        config.scenario.scenario_dir = dir.path().display().to_string();
        let report = ScenarioListReport::from_config(&loaded(config)).expect("list");

        let extra = report
            .scenarios
            .iter()
            .find(|s| s.name == "extra")
            .expect("file scenario listed");
        assert_eq!(extra.source, ScenarioSource::File);
        assert_eq!(extra.probes, 1);
    }

    #[test]
    fn text_rendering_has_header_and_rows() {
        colored::control::set_override(false);
        let report =
            ScenarioListReport::from_config(&loaded(FencecheckConfig::default())).expect("list");
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let text = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(text.contains("NAME"));
        assert!(text.contains("default-deny"));
        assert!(text.contains("builtin"));
    }
}
