//! `fencecheck run` command handler

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tracing::info;

use fencecheck_conformance::{
    ControlPlane, HarnessConfig, KubeControlPlane, MemoryControlPlane, Scenario, ScenarioEngine,
    SuiteReport,
};

use crate::cli::RunArgs;
use crate::commands::{LoadedConfig, collect_scenarios};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
///
/// Returns `CliError::ScenariosFailed` after rendering when any scenario
/// did not pass.
pub async fn execute(
    args: RunArgs,
    loaded: LoadedConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut config = loaded.config;
    if let Some(backend) = args.backend {
        config.cluster.backend = backend.as_str().to_owned();
    }

    let available: Vec<Scenario> = collect_scenarios(&config)?
        .into_iter()
        .map(|(scenario, _)| scenario)
        .collect();
    let selected = select_scenarios(available, &args.scenarios)?;

    let harness = HarnessConfig::from_core(&config);
    let backend = config.cluster.backend.clone();
    info!(
        backend = %backend,
        scenarios = selected.len(),
        source = %loaded.source,
        "running conformance scenarios"
    );

    let suite = match backend.as_str() {
        "memory" => {
            let control_plane = MemoryControlPlane::new()
                .with_isolation_annotation(harness.isolation_annotation.clone());
            run_suite(Arc::new(control_plane), harness, &selected).await?
        }
        "kubernetes" => {
            let control_plane = KubeControlPlane::try_default(&harness).await?;
            run_suite(Arc::new(control_plane), harness, &selected).await?
        }
        other => {
            return Err(CliError::Config(format!(
                "unknown backend '{other}' (expected: kubernetes, memory)"
            )));
        }
    };

    let report = RunReport::new(backend, suite);
    writer.render(&report)?;

    if !report.suite.all_passed() {
        return Err(CliError::ScenariosFailed {
            failed: report.suite.reports.len() - report.suite.passed(),
            total: report.suite.reports.len(),
        });
    }

    Ok(())
}

/// Build an engine for the backend, check connectivity, then run every scenario.
async fn run_suite<C: ControlPlane>(
    control_plane: Arc<C>,
    config: HarnessConfig,
    scenarios: &[Scenario],
) -> Result<SuiteReport, CliError> {
    let engine = ScenarioEngine::new(control_plane, config)?;
    engine.check_connectivity().await?;
    Ok(engine.run_all(scenarios).await)
}

/// Keep only the requested scenarios, in request order.
///
/// An empty request selects everything. Unknown names are an error so a typo
/// never turns into an empty, trivially passing run.
pub fn select_scenarios(
    available: Vec<Scenario>,
    requested: &[String],
) -> Result<Vec<Scenario>, CliError> {
    if requested.is_empty() {
        return Ok(available);
    }

    let mut selected = Vec::with_capacity(requested.len());
    for name in requested {
        if selected.iter().any(|s: &Scenario| &s.name == name) {
            continue;
        }
        let scenario = available
            .iter()
            .find(|s| &s.name == name)
            .ok_or_else(|| CliError::Command(format!("unknown scenario: {name}")))?;
        selected.push(scenario.clone());
    }
    Ok(selected)
}

/// Result of a `run` invocation.
#[derive(Serialize)]
pub struct RunReport {
    /// Backend the scenarios ran against
    pub backend: String,
    /// Scenarios that passed
    pub passed: usize,
    /// Scenarios with mismatching probes
    pub failed: usize,
    /// Scenarios that ended in a setup error
    pub errored: usize,
    /// Resources that could not be deleted
    pub teardown_failures: usize,
    /// Per-scenario reports
    pub suite: SuiteReport,
}

impl RunReport {
    pub fn new(backend: String, suite: SuiteReport) -> Self {
        Self {
            backend,
            passed: suite.passed(),
            failed: suite.failed(),
            errored: suite.errored(),
            teardown_failures: suite.teardown_failures(),
            suite,
        }
    }
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Conformance run (backend: {})", self.backend.bold())?;
        writeln!(w)?;

        self.suite.render_text(w)?;
        if self.teardown_failures > 0 {
            writeln!(
                w,
                "{} {} resources could not be deleted",
                "warning:".yellow().bold(),
                self.teardown_failures
            )?;
        }

        Ok(())
    }
}
