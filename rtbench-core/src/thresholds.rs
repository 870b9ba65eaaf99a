use rtbench_metrics::{RunSummary, SeriesStats};

/// Expressions attached to one metric key such as `http_req_duration{target:swoole}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSet {
    pub metric: String,
    pub expressions: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    #[error("invalid threshold metric `{metric}`: {error}")]
    InvalidMetric { metric: String, error: String },

    #[error("invalid threshold expression for metric `{metric}`: {error}")]
    InvalidExpr { metric: String, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
pub enum ThresholdMetric {
    #[strum(serialize = "http_req_duration")]
    Duration,
    #[strum(serialize = "http_req_failed")]
    Failed,
    #[strum(serialize = "http_reqs")]
    Reqs,
    /// `rate` is the share of requests passing every response check; `count` the failures.
    #[strum(serialize = "checks")]
    Checks,
}

/// Which series a threshold applies to. Empty selects the run totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdSelector {
    pub target: Option<String>,
    pub category: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdKey {
    pub metric: ThresholdMetric,
    pub selector: ThresholdSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdAgg {
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
    P(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdViolation {
    pub metric: String,
    pub expression: String,
    /// First failing observation; `None` when the series does not exist or has no value.
    pub observed: Option<f64>,
}

pub fn parse_threshold_key(raw: &str) -> Result<ThresholdKey, String> {
    let raw = raw.trim();
    let (name, selector_raw) = match raw.find('{') {
        Some(open) => {
            let inner = raw[open + 1..]
                .strip_suffix('}')
                .ok_or_else(|| format!("unterminated selector in `{raw}`"))?;
            (&raw[..open], Some(inner))
        }
        None => (raw, None),
    };

    let metric: ThresholdMetric = name
        .trim()
        .parse()
        .map_err(|_| format!("unknown metric `{}`", name.trim()))?;

    let mut selector = ThresholdSelector::default();
    for part in selector_raw
        .into_iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        let (k, v) = part
            .split_once([':', '='])
            .ok_or_else(|| format!("invalid selector `{part}` (expected key:value)"))?;
        let v = v.trim().trim_matches('"').to_string();
        let slot = match k.trim() {
            "target" | "runtime" => &mut selector.target,
            "category" => &mut selector.category,
            "endpoint" => &mut selector.endpoint,
            other => return Err(format!("unknown selector key `{other}`")),
        };
        *slot = Some(v);
    }

    Ok(ThresholdKey { metric, selector })
}

pub fn parse_threshold_expr(raw: &str) -> Result<ThresholdExpr, String> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty threshold".to_string());
    }

    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| format!("invalid threshold (missing operator): {raw}"))?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() || right.is_empty() {
        return Err(format!("invalid threshold: {raw}"));
    }

    let agg = match left.to_ascii_lowercase().as_str() {
        "avg" => ThresholdAgg::Avg,
        "min" => ThresholdAgg::Min,
        "max" => ThresholdAgg::Max,
        "med" => ThresholdAgg::Med,
        "count" => ThresholdAgg::Count,
        "rate" => ThresholdAgg::Rate,
        other => {
            let Some(inner) = other.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) else {
                return Err(format!("unknown aggregation `{left}` in threshold: {raw}"));
            };
            let p: u32 = inner
                .parse()
                .map_err(|_| format!("invalid percentile in threshold: {raw}"))?;
            if ![50, 75, 90, 95, 99].contains(&p) {
                return Err(format!(
                    "unsupported percentile in threshold (expected 50, 75, 90, 95 or 99): {raw}"
                ));
            }
            ThresholdAgg::P(p)
        }
    };

    let value: f64 = right
        .parse()
        .map_err(|_| format!("invalid numeric value in threshold: {raw}"))?;

    Ok(ThresholdExpr { agg, op, value })
}

/// Parses every key and expression without evaluating anything.
pub fn validate_thresholds(sets: &[ThresholdSet]) -> Result<(), ThresholdError> {
    for set in sets {
        parse_threshold_key(&set.metric).map_err(|error| ThresholdError::InvalidMetric {
            metric: set.metric.clone(),
            error,
        })?;
        for expr in &set.expressions {
            parse_threshold_expr(expr).map_err(|error| ThresholdError::InvalidExpr {
                metric: set.metric.clone(),
                error,
            })?;
        }
    }
    Ok(())
}

pub fn evaluate_thresholds(
    summary: &RunSummary,
    sets: &[ThresholdSet],
) -> Result<Vec<ThresholdViolation>, ThresholdError> {
    let mut out: Vec<ThresholdViolation> = Vec::new();

    for set in sets {
        let key = parse_threshold_key(&set.metric).map_err(|error| {
            ThresholdError::InvalidMetric {
                metric: set.metric.clone(),
                error,
            }
        })?;
        let series = select_series(summary, &key.selector);

        for expr_raw in &set.expressions {
            let expr = parse_threshold_expr(expr_raw).map_err(|error| {
                ThresholdError::InvalidExpr {
                    metric: set.metric.clone(),
                    error,
                }
            })?;

            // Every selected series must pass; a missing series fails.
            let mut failed: Option<Option<f64>> = series.is_empty().then_some(None);
            for s in &series {
                let observed = observed_value(s, key.metric, &expr.agg);
                if !observed.is_some_and(|v| compare(v, expr.op, expr.value)) {
                    failed = Some(observed);
                    break;
                }
            }

            if let Some(observed) = failed {
                out.push(ThresholdViolation {
                    metric: set.metric.clone(),
                    expression: expr_raw.clone(),
                    observed,
                });
            }
        }
    }

    Ok(out)
}

fn select_series<'a>(summary: &'a RunSummary, sel: &'a ThresholdSelector) -> Vec<&'a SeriesStats> {
    if let Some(endpoint) = &sel.endpoint {
        return summary
            .endpoint_rows(endpoint)
            .filter(|e| sel.target.as_ref().is_none_or(|t| *t == e.target))
            .filter(|e| sel.category.as_ref().is_none_or(|c| *c == e.category))
            .map(|e| &e.stats)
            .collect();
    }

    match (&sel.target, &sel.category) {
        (None, None) => vec![&summary.totals],
        (Some(t), None) => summary.target(t).map(|t| &t.stats).into_iter().collect(),
        (None, Some(c)) => summary.category(c).map(|c| &c.stats).into_iter().collect(),
        (Some(t), Some(c)) => summary.bucket(t, c).map(|b| &b.stats).into_iter().collect(),
    }
}

fn observed_value(s: &SeriesStats, metric: ThresholdMetric, agg: &ThresholdAgg) -> Option<f64> {
    match metric {
        ThresholdMetric::Duration => {
            if matches!(agg, ThresholdAgg::Count) {
                return Some(s.requests as f64);
            }
            let l = s.latency.as_ref()?;
            match agg {
                ThresholdAgg::Avg => Some(l.mean_ms),
                ThresholdAgg::Min => Some(l.min_ms),
                ThresholdAgg::Max => Some(l.max_ms),
                ThresholdAgg::Med | ThresholdAgg::P(50) => Some(l.p50_ms),
                ThresholdAgg::P(75) => Some(l.p75_ms),
                ThresholdAgg::P(90) => Some(l.p90_ms),
                ThresholdAgg::P(95) => Some(l.p95_ms),
                ThresholdAgg::P(99) => Some(l.p99_ms),
                _ => None,
            }
        }
        ThresholdMetric::Failed => match agg {
            ThresholdAgg::Rate => (s.requests > 0).then_some(s.error_rate),
            ThresholdAgg::Count => Some(s.errors as f64),
            _ => None,
        },
        ThresholdMetric::Reqs => match agg {
            ThresholdAgg::Count => Some(s.requests as f64),
            ThresholdAgg::Rate => Some(s.throughput_rps),
            _ => None,
        },
        ThresholdMetric::Checks => match agg {
            ThresholdAgg::Rate => s.check_pass_rate(),
            ThresholdAgg::Count => Some(s.checks_failed as f64),
            _ => None,
        },
    }
}

fn compare(observed: f64, op: ThresholdOp, expected: f64) -> bool {
    match op {
        ThresholdOp::Lt => observed < expected,
        ThresholdOp::Lte => observed <= expected,
        ThresholdOp::Gt => observed > expected,
        ThresholdOp::Gte => observed >= expected,
        ThresholdOp::Eq => (observed - expected).abs() < f64::EPSILON,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtbench_metrics::{Aggregator, SampleResult};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn summary() -> RunSummary {
        let agg = Aggregator::new();
        agg.declare_target("phpfpm");
        for (target, ms, status) in [
            ("swoole", 10, 200),
            ("swoole", 20, 200),
            ("frankenphp", 30, 200),
            ("frankenphp", 40, 500),
        ] {
            agg.record(SampleResult {
                target: Arc::from(target),
                workload_path: Arc::from("/api/static"),
                endpoint: Arc::from("static"),
                category: Arc::from("basic"),
                started: Instant::now(),
                latency: Duration::from_millis(ms),
                http_status: status,
                success: status == 200,
                body_len: 16,
                bytes_sent: 40,
                bytes_received: 90,
                error: None,
                failed_checks: if status == 200 { Vec::new() } else { vec!["status_ok"] },
            });
        }
        agg.snapshot().unwrap_or_else(|e| panic!("{e}"))
    }

    fn set(metric: &str, exprs: &[&str]) -> ThresholdSet {
        ThresholdSet {
            metric: metric.to_string(),
            expressions: exprs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn parse_threshold_expr_trims_whitespace() {
        let expr = parse_threshold_expr("  avg  <=  123  ").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::Avg);
        assert_eq!(expr.op, ThresholdOp::Lte);
        assert_eq!(expr.value, 123.0);
    }

    #[test]
    fn parse_threshold_expr_rejects_unsupported_percentiles() {
        let err = match parse_threshold_expr("p(42)<1") {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(err.contains("unsupported percentile"));
    }

    #[test]
    fn parse_threshold_key_accepts_selectors() {
        let key = parse_threshold_key("http_req_duration{runtime:swoole, category=cache}")
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(key.metric, ThresholdMetric::Duration);
        assert_eq!(key.selector.target.as_deref(), Some("swoole"));
        assert_eq!(key.selector.category.as_deref(), Some("cache"));

        assert!(parse_threshold_key("http_req_blocked").is_err());
        assert!(parse_threshold_key("http_reqs{colour:red}").is_err());
    }

    #[test]
    fn totals_and_per_target_thresholds_are_evaluated() {
        let s = summary();
        let sets = [
            set("http_reqs", &["count==4", "count>10"]),
            set("http_req_failed", &["rate<0.5"]),
            set("http_req_failed{target:frankenphp}", &["rate<0.1"]),
            set("http_req_duration{target:swoole}", &["max<25", "p(95)<1000"]),
        ];
        let violations = evaluate_thresholds(&s, &sets).unwrap_or_else(|e| panic!("{e}"));

        let failed: Vec<(&str, &str)> = violations
            .iter()
            .map(|v| (v.metric.as_str(), v.expression.as_str()))
            .collect();
        assert_eq!(
            failed,
            [
                ("http_reqs", "count>10"),
                ("http_req_failed{target:frankenphp}", "rate<0.1"),
            ]
        );
        assert_eq!(violations[1].observed, Some(0.5));
    }

    #[test]
    fn missing_series_fail_their_expressions() {
        let s = summary();
        let sets = [
            set("http_req_duration{target:hhvm}", &["avg<100"]),
            set("http_req_duration{target:phpfpm}", &["avg<100"]),
            set("http_req_duration{endpoint:nope}", &["max<100"]),
        ];
        let violations = evaluate_thresholds(&s, &sets).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(violations.len(), 3);
        assert!(violations.iter().all(|v| v.observed.is_none()));
    }

    #[test]
    fn endpoint_threshold_applies_to_every_target() {
        let s = summary();
        let violations =
            evaluate_thresholds(&s, &[set("http_req_duration{endpoint:static}", &["max<35"])])
                .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(violations.len(), 1);
        let observed = violations[0].observed.unwrap_or_default();
        assert!((observed - 40.0).abs() / 40.0 < 0.01);
    }

    #[test]
    fn check_thresholds_use_pass_rate_and_failure_count() {
        let s = summary();
        let sets = [
            set("checks", &["rate>0.9", "count<1"]),
            set("checks{target:swoole}", &["rate==1"]),
            set("checks{target:phpfpm}", &["rate>0.5"]),
        ];
        let violations = evaluate_thresholds(&s, &sets).unwrap_or_else(|e| panic!("{e}"));

        let failed: Vec<(&str, &str, Option<f64>)> = violations
            .iter()
            .map(|v| (v.metric.as_str(), v.expression.as_str(), v.observed))
            .collect();
        assert_eq!(
            failed,
            [
                ("checks", "rate>0.9", Some(0.75)),
                ("checks", "count<1", Some(1.0)),
                ("checks{target:phpfpm}", "rate>0.5", None),
            ]
        );
    }

    #[test]
    fn invalid_expressions_are_reported() {
        let err = validate_thresholds(&[set("http_reqs", &["count"])]);
        assert!(matches!(err, Err(ThresholdError::InvalidExpr { .. })));
    }
}
