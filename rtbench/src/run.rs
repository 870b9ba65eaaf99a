use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;

use crate::bench_yaml::{BenchConfig, load_bench_config};
use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output::{self, JsonViolation};
use crate::run_error::RunError;

/// Scenario results as written to `--report-out`.
#[derive(Debug, Serialize)]
struct ReportFile {
    config: String,
    scenarios: Vec<ScenarioReport>,
}

#[derive(Debug, Serialize)]
struct ScenarioReport {
    scenario: String,
    report: rtbench_core::Report,
    threshold_violations: Vec<JsonViolation>,
}

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let cfg = load_bench_config(&args.config)
        .await
        .map_err(RunError::InvalidInput)?;
    let BenchConfig {
        seed,
        target_selection,
        targets,
        catalog,
        pacing,
        preflight,
        scenarios,
        thresholds,
    } = cfg;

    let scenarios = select_scenarios(scenarios, &args.scenarios).map_err(RunError::InvalidInput)?;
    let scenarios = rtbench_core::scenarios_from_options(
        scenarios,
        rtbench_core::RunConfig {
            iterations: args.iterations,
            vus: args.vus,
            duration: args.duration,
        },
    )
    .map_err(|e| RunError::from_core("invalid scenario", e))?;

    out.print_header(&args.config, &scenarios);

    let targets = Arc::new(targets);
    let catalog = Arc::new(catalog);
    let stop = Arc::new(rtbench_core::StopSignal::new());
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; draining current scenario");
                stop.stop();
            }
        });
    }

    if let Some(preflight) = &preflight {
        rtbench_core::run_preflight(&rtbench_core::HttpClient::default(), &targets, preflight)
            .await
            .map_err(|e| RunError::from_core("preflight", e))?;
    }

    let seed = args.seed.or(seed);
    let mut results = Vec::with_capacity(scenarios.len());
    let mut thresholds_failed = false;

    for scenario in &scenarios {
        let mut runner = rtbench_core::Runner::new(targets.clone(), catalog.clone())
            .pacing(pacing.clone())
            .target_selection(target_selection)
            .stop_signal(stop.clone());
        if let Some(seed) = seed {
            runner = runner.seed(seed);
        }
        if let Some(progress) = out.progress() {
            runner = runner.progress(progress);
        }

        let summary = runner
            .run(scenario)
            .await
            .map_err(|e| RunError::from_core("scenario failed", e))?;

        let report = rtbench_core::render(&summary);
        let violations = rtbench_core::evaluate_thresholds(&summary, &thresholds)
            .map_err(|e| RunError::InvalidInput(e.into()))?;
        thresholds_failed |= !violations.is_empty();

        out.print_summary(&scenario.name, &report, &violations)
            .map_err(RunError::RuntimeError)?;

        results.push(ScenarioReport {
            scenario: scenario.name.clone(),
            report,
            threshold_violations: violations.iter().map(JsonViolation::from).collect(),
        });

        if stop.is_stopped() {
            tracing::warn!("skipping remaining scenarios after interrupt");
            break;
        }
    }

    if let Some(path) = &args.report_out {
        let file = ReportFile {
            config: args.config.display().to_string(),
            scenarios: results,
        };
        write_report(path, &file)
            .await
            .map_err(RunError::RuntimeError)?;
    }

    Ok(ExitCode::from_thresholds(thresholds_failed))
}

/// Keeps the scenarios named on the command line, in config order. An empty filter keeps all.
fn select_scenarios(
    scenarios: Vec<rtbench_core::ScenarioOptions>,
    wanted: &[String],
) -> anyhow::Result<Vec<rtbench_core::ScenarioOptions>> {
    if wanted.is_empty() {
        return Ok(scenarios);
    }

    if let Some(unknown) = wanted
        .iter()
        .find(|w| !scenarios.iter().any(|s| &s.name == *w))
    {
        let known: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        anyhow::bail!(
            "unknown scenario `{unknown}` (available: {})",
            known.join(", ")
        );
    }

    Ok(scenarios
        .into_iter()
        .filter(|s| wanted.contains(&s.name))
        .collect())
}

async fn write_report(path: &Path, file: &ReportFile) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(file).context("failed to serialize report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create report dir: {}", parent.display()))?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote report");
    Ok(())
}
