//! Output rendering for conformance results
//!
//! Every command hands its payload to [`OutputWriter`], which either pretty-prints
//! JSON or asks the payload to draw itself through [`Render`]. Scenario and suite
//! reports from `fencecheck-conformance` render here so `run` and any future
//! command print verdicts the same way.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use fencecheck_conformance::{ScenarioReport, ScenarioVerdict, SuiteReport};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command payloads as text or JSON.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    /// Render a payload to an arbitrary writer.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable text rendering, implemented next to `Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

impl Render for ScenarioReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let label = match self.verdict {
            ScenarioVerdict::Pass => "PASS".green().bold(),
            ScenarioVerdict::Fail { .. } => "FAIL".red().bold(),
            ScenarioVerdict::SetupError { .. } => "ERROR".yellow().bold(),
        };
        writeln!(
            w,
            "{label} {} (run {}, {} probes, {}ms)",
            self.scenario.bold(),
            self.run_id,
            self.probes.len(),
            self.duration_ms
        )?;

        if let ScenarioVerdict::SetupError { stage, reason, .. } = &self.verdict {
            writeln!(w, "  setup error during {stage}: {reason}")?;
        }
        // setup errors keep the mismatches seen before them
        for probe in self.verdict.mismatches() {
            writeln!(w, "  mismatch {probe}")?;
        }

        for probe in self.model_disagreements() {
            writeln!(
                w,
                "  {} policy model predicts {} for step {}",
                "note:".cyan(),
                probe.model,
                probe.step
            )?;
        }

        for failure in &self.teardown_failures {
            writeln!(w, "  {} {failure}", "teardown:".yellow())?;
        }

        Ok(())
    }
}

impl Render for SuiteReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for report in &self.reports {
            report.render_text(w)?;
        }

        writeln!(w)?;
        let summary = format!(
            "{} scenarios: {} passed, {} failed, {} errored",
            self.reports.len(),
            self.passed(),
            self.failed(),
            self.errored()
        );
        if self.all_passed() {
            writeln!(w, "{}", summary.green())?;
        } else {
            writeln!(w, "{}", summary.red())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use fencecheck_conformance::{ProbeRecord, ScenarioPhase};
    use fencecheck_core::types::{ProbeResult, Verdict};

    use super::*;

    fn record(step: usize, expected: Verdict, observed: ProbeResult) -> ProbeRecord {
        ProbeRecord {
            step,
            client: "client-a".to_owned(),
            domain: "a".to_owned(),
            port: 80,
            expected,
            observed,
            model: expected,
        }
    }

    fn report(verdict: ScenarioVerdict) -> ScenarioReport {
        ScenarioReport {
            scenario: "ports".to_owned(),
            run_id: "1a2b3c4d".to_owned(),
            verdict,
            probes: vec![record(0, Verdict::Deny, ProbeResult::Connected)],
            teardown_failures: Vec::new(),
            trail: Vec::new(),
            duration_ms: 12,
        }
    }

    fn text(payload: &(impl Render + Serialize)) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        OutputWriter::new(OutputFormat::Text)
            .render_to(payload, &mut buffer)
            .expect("text rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn failed_scenario_lists_mismatches() {
        let output = text(&report(ScenarioVerdict::Fail {
            mismatches: vec![record(0, Verdict::Deny, ProbeResult::Connected)],
        }));
        assert!(output.starts_with("FAIL ports (run 1a2b3c4d, 1 probes, 12ms)"));
        assert!(output.contains(
            "  mismatch step 0: client-a in a -> port 80: expected deny, observed connected"
        ));
    }

    #[test]
    fn setup_error_shows_stage_and_earlier_mismatches() {
        let output = text(&report(ScenarioVerdict::SetupError {
            stage: ScenarioPhase::Probing,
            reason: "probe 'np-a/client-y-2' did not finish within 5000ms".to_owned(),
            mismatches: vec![record(0, Verdict::Deny, ProbeResult::Connected)],
        }));
        assert!(output.starts_with("ERROR ports"));
        assert!(output.contains("setup error during probing: probe 'np-a/client-y-2'"));
        assert!(output.contains("mismatch step 0: client-a"));
    }

    #[test]
    fn suite_summary_counts_verdicts() {
        let suite = SuiteReport {
            reports: vec![
                report(ScenarioVerdict::Pass),
                report(ScenarioVerdict::Fail {
                    mismatches: Vec::new(),
                }),
            ],
        };
        let output = text(&suite);
        assert!(output.contains("PASS ports"));
        assert!(output.contains("FAIL ports"));
        assert!(output.ends_with("2 scenarios: 1 passed, 1 failed, 0 errored\n"));
    }

    #[test]
    fn json_output_is_the_serialized_report() {
        let mut buffer = Vec::new();
        OutputWriter::new(OutputFormat::Json)
            .render_to(&report(ScenarioVerdict::Pass), &mut buffer)
            .expect("json rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.ends_with('\n'));
        let parsed: serde_json::Value =
            serde_json::from_str(&output).expect("should parse back to JSON");
        assert_eq!(parsed["scenario"], "ports");
        assert_eq!(parsed["verdict"]["result"], "pass");
        assert!(!output.contains("PASS"), "text rendering is not used");
    }
}
