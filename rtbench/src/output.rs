use std::path::Path;

use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) use json::JsonViolation;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, config_path: &Path, scenarios: &[rtbench_core::ScenarioConfig]);
    fn progress(&self) -> Option<rtbench_core::ProgressFn>;
    fn print_summary(
        &self,
        scenario: &str,
        report: &rtbench_core::Report,
        violations: &[rtbench_core::ThresholdViolation],
    ) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
