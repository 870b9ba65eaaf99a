use std::fmt::Write as _;

use super::{Report, SeriesReport};

fn ms(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => format!("{v:.2}ms"),
        _ => "n/a".to_string(),
    }
}

fn rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.1}")
    } else {
        "0".to_string()
    }
}

fn percent(v: f64) -> String {
    if v.is_finite() {
        format!("{:.2}%", v * 100.0)
    } else {
        "0.00%".to_string()
    }
}

fn pass_rate(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => percent(v),
        _ => "n/a".to_string(),
    }
}

fn width(names: impl Iterator<Item = usize>, header: &str) -> usize {
    names.fold(header.len(), usize::max)
}

fn row(out: &mut String, name: &str, w: usize, s: &SeriesReport) {
    writeln!(
        out,
        "  {name:<w$}  {:>9}  {:>8}  {:>8}  {:>10}  {:>10}  {:>10}  {:>9}  {:>8}",
        s.requests,
        percent(s.error_rate),
        pass_rate(s.check_pass_rate),
        ms(s.mean_ms),
        ms(s.p95_ms),
        ms(s.p99_ms),
        rate(s.throughput_rps),
        format!("{:.2}", s.transfer_mb_per_sec),
    )
    .ok();
}

fn header(out: &mut String, first: &str, w: usize) {
    writeln!(
        out,
        "  {first:<w$}  {:>9}  {:>8}  {:>8}  {:>10}  {:>10}  {:>10}  {:>9}  {:>8}",
        "requests", "errors", "checks", "mean", "p95", "p99", "req/s", "MB/s"
    )
    .ok();
}

impl Report {
    /// Human-readable comparison table.
    pub fn render_table(&self) -> String {
        let mut out = String::new();

        writeln!(
            out,
            "elapsed: {:.2}s  (latency percentiles within {:.1}%)",
            self.elapsed_secs,
            self.latency_error_bound * 100.0
        )
        .ok();
        out.push('\n');

        out.push_str("targets\n");
        let w = width(self.targets.iter().map(|t| t.target.len()), "target");
        header(&mut out, "target", w);
        for t in &self.targets {
            row(&mut out, &t.target, w, &t.stats);
        }
        row(&mut out, "total", w, &self.totals);
        out.push('\n');

        out.push_str("ranking (mean latency)\n");
        for r in &self.ranking {
            writeln!(out, "  {}. {} {}", r.rank, r.target, ms(r.mean_ms)).ok();
        }

        for c in &self.categories {
            out.push('\n');
            writeln!(out, "category: {}", c.category).ok();
            let w = width(c.targets.iter().map(|t| t.target.len()), "target");
            header(&mut out, "target", w);
            for t in &c.targets {
                row(&mut out, &t.target, w, &t.stats);
            }
            writeln!(
                out,
                "  best latency: {}  best throughput: {}",
                c.best_latency.as_deref().unwrap_or("n/a"),
                c.best_throughput.as_deref().unwrap_or("n/a"),
            )
            .ok();
        }

        if !self.endpoints.is_empty() {
            out.push('\n');
            out.push_str("endpoints\n");
            let labels: Vec<String> = self
                .endpoints
                .iter()
                .map(|e| format!("{} {}", e.target, e.endpoint))
                .collect();
            let w = width(labels.iter().map(String::len), "endpoint");
            header(&mut out, "endpoint", w);
            for (label, e) in labels.iter().zip(&self.endpoints) {
                row(&mut out, label, w, &e.stats);
            }
        }

        let failures: Vec<_> = self
            .targets
            .iter()
            .flat_map(|t| t.stats.failures.iter().map(move |(k, n)| (&t.target, k, n)))
            .collect();
        if !failures.is_empty() {
            out.push('\n');
            out.push_str("failures\n");
            for (target, kind, n) in failures {
                writeln!(out, "  {target} {kind}: {n}").ok();
            }
        }

        let failed_checks: Vec<_> = self
            .targets
            .iter()
            .flat_map(|t| {
                t.stats
                    .check_failures
                    .iter()
                    .map(move |(k, n)| (&t.target, k, n))
            })
            .collect();
        if !failed_checks.is_empty() {
            out.push('\n');
            out.push_str("failed checks\n");
            for (target, check, n) in failed_checks {
                writeln!(out, "  {target} {check}: {n}").ok();
            }
        }

        if self.rps.samples > 0 {
            out.push('\n');
            writeln!(
                out,
                "rps: avg={} stdev={} max={} (n={})",
                rate(self.rps.avg),
                rate(self.rps.stdev),
                rate(self.rps.max),
                self.rps.samples
            )
            .ok();
        }

        out
    }
}
