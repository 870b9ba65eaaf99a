use crate::bench_yaml::load_bench_config;
use crate::cli::CheckArgs;
use crate::run_error::RunError;

/// Validates the config and probes every target once. Sends no load.
pub async fn check(args: CheckArgs) -> Result<(), RunError> {
    let cfg = load_bench_config(&args.config)
        .await
        .map_err(RunError::InvalidInput)?;

    let scenarios =
        rtbench_core::scenarios_from_options(cfg.scenarios, rtbench_core::RunConfig::default())
            .map_err(|e| RunError::from_core("invalid scenario", e))?;

    println!(
        "config ok: {} targets, {} workloads in {} categories, {} scenarios, {} thresholds",
        cfg.targets.len(),
        cfg.catalog.len(),
        cfg.catalog.categories().len(),
        scenarios.len(),
        cfg.thresholds.len()
    );
    for category in cfg.catalog.categories() {
        let paths: Vec<&str> = cfg
            .catalog
            .in_category(category)
            .map(|w| w.path.as_str())
            .collect();
        println!("  {category:<12} {}", paths.join(" "));
    }

    let preflight = cfg.preflight.unwrap_or_default();
    let health = rtbench_core::check_targets(
        &rtbench_core::HttpClient::default(),
        &cfg.targets,
        &preflight,
    )
    .await;

    let mut unhealthy = Vec::new();
    for h in &health {
        let status = h.status.map_or_else(|| "-".to_string(), |s| s.to_string());
        let latency_ms = h.latency.as_secs_f64() * 1000.0;
        if h.healthy {
            println!("  {:<12} ok    status={status} {latency_ms:.1}ms", h.target);
        } else {
            println!(
                "  {:<12} FAIL  status={status} {}",
                h.target,
                h.error.as_deref().unwrap_or("unexpected status")
            );
            unhealthy.push(h.target.clone());
        }
    }

    if unhealthy.is_empty() {
        Ok(())
    } else {
        Err(RunError::from_core(
            "check failed",
            rtbench_core::Error::PreflightFailed(unhealthy),
        ))
    }
}
