use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _config_path: &Path, _scenarios: &[rtbench_core::ScenarioConfig]) {}

    fn progress(&self) -> Option<rtbench_core::ProgressFn> {
        Some(Arc::new(|u| emit_json_line(&ProgressLine::from(&u))))
    }

    fn print_summary(
        &self,
        scenario: &str,
        report: &rtbench_core::Report,
        violations: &[rtbench_core::ThresholdViolation],
    ) -> anyhow::Result<()> {
        emit_json_line(&SummaryLine {
            kind: "summary",
            scenario,
            report,
            threshold_violations: violations.iter().map(JsonViolation::from).collect(),
        });
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ProgressLine {
    kind: &'static str,
    scenario: String,
    tick: u64,
    elapsed_secs: f64,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<usize>,
    target_vus: u64,
    active_vus: u64,
    requests_total: u64,
    errors_total: u64,
    rps_now: f64,
    error_rate_now: f64,
}

impl From<&rtbench_core::ProgressUpdate> for ProgressLine {
    fn from(u: &rtbench_core::ProgressUpdate) -> Self {
        Self {
            kind: "progress",
            scenario: u.scenario.clone(),
            tick: u.tick,
            elapsed_secs: u.elapsed.as_secs_f64(),
            state: u.state.name(),
            stage: u.stage.as_ref().map(|s| s.index + 1),
            target_vus: u.target_vus,
            active_vus: u.active_vus,
            requests_total: u.requests_total,
            errors_total: u.errors_total,
            rps_now: u.rps_now,
            error_rate_now: u.error_rate_now,
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryLine<'a> {
    kind: &'static str,
    scenario: &'a str,
    report: &'a rtbench_core::Report,
    threshold_violations: Vec<JsonViolation>,
}

/// Serializable view of a failed threshold.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct JsonViolation {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
}

impl From<&rtbench_core::ThresholdViolation> for JsonViolation {
    fn from(v: &rtbench_core::ThresholdViolation) -> Self {
        Self {
            metric: v.metric.clone(),
            expression: v.expression.clone(),
            observed: v.observed,
        }
    }
}

fn emit_json_line<T: Serialize>(value: &T) {
    let mut out = std::io::stdout().lock();
    if let Err(err) = serde_json::to_writer(&mut out, value) {
        tracing::warn!(error = %err, "failed to serialize output line");
        return;
    }
    let _ = writeln!(out);
}
