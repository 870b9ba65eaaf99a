use std::cmp::Ordering;
use std::collections::BTreeMap;

use rtbench_metrics::{RunSummary, SeriesStats};
use serde::Serialize;

mod format;

/// Per-series figures shown in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesReport {
    pub requests: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub mean_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub throughput_rps: f64,
    /// Received bytes per second, in MB/s.
    pub transfer_mb_per_sec: f64,
    pub failures: BTreeMap<String, u64>,
    /// Share of requests passing every response check; `None` without requests.
    pub check_pass_rate: Option<f64>,
    pub checks_failed: u64,
    pub check_failures: BTreeMap<String, u64>,
}

impl SeriesReport {
    fn from_stats(s: &SeriesStats, elapsed_secs: f64) -> Self {
        let l = s.latency.as_ref();
        let transfer_mb_per_sec = if elapsed_secs > 0.0 {
            s.bytes_received as f64 / elapsed_secs / (1024.0 * 1024.0)
        } else {
            0.0
        };
        Self {
            requests: s.requests,
            errors: s.errors,
            error_rate: s.error_rate,
            mean_ms: l.map(|l| l.mean_ms),
            p50_ms: l.map(|l| l.p50_ms),
            p95_ms: l.map(|l| l.p95_ms),
            p99_ms: l.map(|l| l.p99_ms),
            max_ms: l.map(|l| l.max_ms),
            throughput_rps: s.throughput_rps,
            transfer_mb_per_sec,
            failures: s.failures.clone(),
            check_pass_rate: s.check_pass_rate(),
            checks_failed: s.checks_failed,
            check_failures: s.check_failures.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    pub target: String,
    #[serde(flatten)]
    pub stats: SeriesReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    /// 1-based; targets without samples are ranked last.
    pub rank: usize,
    pub target: String,
    pub mean_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryComparison {
    pub category: String,
    pub targets: Vec<TargetReport>,
    /// Target with the lowest mean latency in this category.
    pub best_latency: Option<String>,
    /// Target with the highest throughput in this category.
    pub best_throughput: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointReport {
    pub target: String,
    pub category: String,
    pub endpoint: String,
    pub path: String,
    #[serde(flatten)]
    pub stats: SeriesReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RpsReport {
    pub samples: u64,
    pub avg: f64,
    pub stdev: f64,
    pub max: f64,
}

/// Comparison of all targets over one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub elapsed_secs: f64,
    /// Relative error bound of every latency percentile in the report.
    pub latency_error_bound: f64,
    pub targets: Vec<TargetReport>,
    pub ranking: Vec<RankEntry>,
    pub categories: Vec<CategoryComparison>,
    pub endpoints: Vec<EndpointReport>,
    pub totals: SeriesReport,
    pub rps: RpsReport,
}

/// Builds the report for `summary`. Pure; performs no I/O.
pub fn render(summary: &RunSummary) -> Report {
    let secs = summary.elapsed.as_secs_f64();

    let targets: Vec<TargetReport> = summary
        .targets
        .iter()
        .map(|t| TargetReport {
            target: t.target.clone(),
            stats: SeriesReport::from_stats(&t.stats, secs),
        })
        .collect();

    let categories = summary
        .categories
        .iter()
        .map(|c| {
            let rows: Vec<TargetReport> = summary
                .buckets
                .iter()
                .filter(|b| b.category == c.category)
                .map(|b| TargetReport {
                    target: b.target.clone(),
                    stats: SeriesReport::from_stats(&b.stats, secs),
                })
                .collect();
            CategoryComparison {
                category: c.category.clone(),
                best_latency: best_latency(&rows),
                best_throughput: best_throughput(&rows),
                targets: rows,
            }
        })
        .collect();

    let endpoints = summary
        .endpoints
        .iter()
        .map(|e| EndpointReport {
            target: e.target.clone(),
            category: e.category.clone(),
            endpoint: e.endpoint.clone(),
            path: e.path.clone(),
            stats: SeriesReport::from_stats(&e.stats, secs),
        })
        .collect();

    Report {
        elapsed_secs: secs,
        latency_error_bound: summary.latency_error_bound,
        ranking: rank_by_mean_latency(&targets),
        targets,
        categories,
        endpoints,
        totals: SeriesReport::from_stats(&summary.totals, secs),
        rps: RpsReport {
            samples: summary.rps.samples,
            avg: summary.rps.avg,
            stdev: summary.rps.stdev,
            max: summary.rps.max,
        },
    }
}

fn cmp_mean(a: &TargetReport, b: &TargetReport) -> Ordering {
    match (a.stats.mean_ms, b.stats.mean_ms) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.target.cmp(&b.target))
}

fn rank_by_mean_latency(targets: &[TargetReport]) -> Vec<RankEntry> {
    let mut sorted: Vec<&TargetReport> = targets.iter().collect();
    sorted.sort_by(|a, b| cmp_mean(a, b));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, t)| RankEntry {
            rank: i + 1,
            target: t.target.clone(),
            mean_ms: t.stats.mean_ms,
        })
        .collect()
}

fn best_latency(rows: &[TargetReport]) -> Option<String> {
    rows.iter()
        .filter(|r| r.stats.mean_ms.is_some())
        .min_by(|a, b| cmp_mean(a, b))
        .map(|r| r.target.clone())
}

fn best_throughput(rows: &[TargetReport]) -> Option<String> {
    rows.iter()
        .filter(|r| r.stats.requests > 0)
        .min_by(|a, b| {
            b.stats
                .throughput_rps
                .total_cmp(&a.stats.throughput_rps)
                .then_with(|| a.target.cmp(&b.target))
        })
        .map(|r| r.target.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtbench_metrics::{Aggregator, SampleResult};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn record(agg: &Aggregator, target: &str, category: &str, ms: u64, n: usize) {
        for _ in 0..n {
            agg.record(SampleResult {
                target: Arc::from(target),
                workload_path: Arc::from(format!("/api/{category}")),
                endpoint: Arc::from(category),
                category: Arc::from(category),
                started: Instant::now(),
                latency: Duration::from_millis(ms),
                http_status: 200,
                success: true,
                body_len: 64,
                bytes_sent: 50,
                bytes_received: 150,
                error: None,
                failed_checks: Vec::new(),
            });
        }
    }

    fn summary() -> RunSummary {
        let agg = Aggregator::new();
        for t in ["swoole", "phpfpm", "frankenphp", "idle"] {
            agg.declare_target(t);
        }
        agg.mark_started();
        record(&agg, "swoole", "cache", 5, 20);
        record(&agg, "swoole", "cpu", 40, 10);
        record(&agg, "phpfpm", "cache", 12, 5);
        record(&agg, "phpfpm", "cpu", 30, 10);
        record(&agg, "frankenphp", "cache", 5, 20);
        record(&agg, "frankenphp", "cpu", 40, 10);
        std::thread::sleep(Duration::from_millis(5));
        agg.mark_finished();
        agg.snapshot().unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn ranking_orders_by_mean_then_name_with_empty_targets_last() {
        let report = render(&summary());
        let order: Vec<&str> = report.ranking.iter().map(|r| r.target.as_str()).collect();
        // frankenphp and swoole tie on mean latency; name breaks the tie.
        assert_eq!(order, ["frankenphp", "swoole", "phpfpm", "idle"]);
        assert_eq!(report.ranking[3].mean_ms, None);
        assert_eq!(report.ranking[0].rank, 1);
    }

    #[test]
    fn targets_without_samples_are_reported() {
        let report = render(&summary());
        let idle = report
            .targets
            .iter()
            .find(|t| t.target == "idle")
            .unwrap_or_else(|| panic!("missing idle target"));
        assert_eq!(idle.stats.requests, 0);
        assert_eq!(idle.stats.mean_ms, None);
    }

    #[test]
    fn category_comparison_picks_best_targets() {
        let report = render(&summary());
        let cpu = report
            .categories
            .iter()
            .find(|c| c.category == "cpu")
            .unwrap_or_else(|| panic!("missing cpu"));
        assert_eq!(cpu.best_latency.as_deref(), Some("phpfpm"));
        assert_eq!(cpu.targets.len(), 3);

        let cache = report
            .categories
            .iter()
            .find(|c| c.category == "cache")
            .unwrap_or_else(|| panic!("missing cache"));
        assert_eq!(cache.best_latency.as_deref(), Some("frankenphp"));
        assert_eq!(cache.best_throughput.as_deref(), Some("frankenphp"));
    }

    #[test]
    fn report_serializes_optional_latency_as_null() {
        let report = render(&summary());
        let json = serde_json::to_value(&report).unwrap_or_else(|e| panic!("{e}"));
        let idle = json["targets"]
            .as_array()
            .and_then(|t| t.iter().find(|t| t["target"] == "idle"))
            .unwrap_or_else(|| panic!("missing idle"));
        assert!(idle["mean_ms"].is_null());
        assert!(idle["check_pass_rate"].is_null());
        assert_eq!(json["latency_error_bound"], 0.001);
    }

    #[test]
    fn check_pass_rate_is_reported_per_endpoint_and_in_totals() {
        let agg = Aggregator::new();
        record(&agg, "swoole", "cache", 5, 3);
        agg.record(SampleResult {
            target: Arc::from("swoole"),
            workload_path: Arc::from("/api/empty"),
            endpoint: Arc::from("empty"),
            category: Arc::from("cache"),
            started: Instant::now(),
            latency: Duration::from_millis(5),
            http_status: 200,
            success: true,
            body_len: 0,
            bytes_sent: 50,
            bytes_received: 40,
            error: None,
            failed_checks: vec!["has_content"],
        });
        let report = render(&agg.snapshot().unwrap_or_else(|e| panic!("{e}")));

        assert_eq!(report.totals.check_pass_rate, Some(0.75));
        assert_eq!(report.totals.checks_failed, 1);
        assert_eq!(report.totals.check_failures.get("has_content"), Some(&1));
        // Checks fail independently of HTTP success.
        assert_eq!(report.totals.errors, 0);

        let rates: Vec<(&str, Option<f64>)> = report
            .endpoints
            .iter()
            .map(|e| (e.endpoint.as_str(), e.stats.check_pass_rate))
            .collect();
        assert!(rates.contains(&("cache", Some(1.0))));
        assert!(rates.contains(&("empty", Some(0.0))));
    }
}
