use std::sync::Arc;

mod format;
mod progress;

use format::{format_duration_single, format_percent, format_rate};
use progress::HumanProgress;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

fn progress_message(u: &rtbench_core::ProgressUpdate) -> String {
    let rates = format!(
        " vus={}/{} rps={} errors={} reqs={}",
        u.active_vus,
        u.target_vus,
        format_rate(u.rps_now),
        format_percent(u.error_rate_now),
        u.requests_total
    );

    match &u.stage {
        Some(stage) => format!(
            "{} stage={}/{} target={} elapsed={} stage_remaining={}{rates}",
            u.state.name(),
            stage.index + 1,
            stage.count,
            stage.current_target,
            format_duration_single(u.elapsed),
            format_duration_single(stage.stage_remaining),
        ),
        None => format!(
            "{} elapsed={}{rates}",
            u.state.name(),
            format_duration_single(u.elapsed)
        ),
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, config_path: &std::path::Path, scenarios: &[rtbench_core::ScenarioConfig]) {
        println!("config: {}", config_path.display());
        for s in scenarios {
            match &s.executor {
                rtbench_core::ScenarioExecutor::ConstantVus { vus } => println!(
                    "scenario: {} executor=constant-vus vus={vus} iterations={:?} duration={:?}",
                    s.name, s.iterations, s.duration
                ),
                rtbench_core::ScenarioExecutor::RampingVus { start_vus, stages } => println!(
                    "scenario: {} executor=ramping-vus start_vus={start_vus} stages={} duration={:?}",
                    s.name,
                    stages.len(),
                    s.duration
                ),
            }
        }
        if !scenarios.is_empty() {
            println!();
        }
    }

    fn progress(&self) -> Option<rtbench_core::ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |u| {
            let message = progress_message(&u);
            progress.update(&u.scenario, u.total_duration, u.elapsed, message);
        }))
    }

    fn print_summary(
        &self,
        scenario: &str,
        report: &rtbench_core::Report,
        violations: &[rtbench_core::ThresholdViolation],
    ) -> anyhow::Result<()> {
        self.progress.finish();

        println!("scenario: {scenario}");
        print!("{}", report.render_table());
        println!();

        if !violations.is_empty() {
            eprintln!("thresholds failed:");
            for v in violations {
                match v.observed {
                    Some(obs) => eprintln!("  {}: {} (observed {obs})", v.metric, v.expression),
                    None => eprintln!("  {}: {} (missing series)", v.metric, v.expression),
                }
            }
        }

        Ok(())
    }
}
