use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use hdrhistogram::Histogram;

use crate::histogram::{latency_value, new_latency_histogram, summarize_latency};
use crate::key::KeyId;
use crate::sample::SampleResult;
use crate::stats::per_sec;
use crate::summary::SeriesStats;

/// Aggregation cell identity: (target, category).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub target: KeyId,
    pub category: KeyId,
}

/// Counters plus latency histogram for one series of samples.
#[derive(Debug, Clone)]
pub(crate) struct Series {
    pub(crate) count: u64,
    pub(crate) errors: u64,
    pub(crate) body_bytes: u64,
    pub(crate) bytes_sent: u64,
    pub(crate) bytes_received: u64,
    pub(crate) latency_ns: Histogram<u64>,
    pub(crate) failures: BTreeMap<String, u64>,
    /// Samples that failed at least one response check.
    pub(crate) checks_failed: u64,
    pub(crate) check_failures: BTreeMap<&'static str, u64>,
}

impl Series {
    pub(crate) fn new() -> Self {
        Self {
            count: 0,
            errors: 0,
            body_bytes: 0,
            bytes_sent: 0,
            bytes_received: 0,
            latency_ns: new_latency_histogram(),
            failures: BTreeMap::new(),
            checks_failed: 0,
            check_failures: BTreeMap::new(),
        }
    }

    fn record(&mut self, sample: &SampleResult) {
        self.count = self.count.saturating_add(1);
        self.body_bytes = self.body_bytes.saturating_add(sample.body_len);
        self.bytes_sent = self.bytes_sent.saturating_add(sample.bytes_sent);
        self.bytes_received = self.bytes_received.saturating_add(sample.bytes_received);

        self.latency_ns
            .saturating_record(latency_value(sample.latency));

        if !sample.success {
            self.errors = self.errors.saturating_add(1);
            *self.failures.entry(failure_key(sample)).or_insert(0) += 1;
        }

        if !sample.checks_passed() {
            self.checks_failed = self.checks_failed.saturating_add(1);
            for name in &sample.failed_checks {
                *self.check_failures.entry(*name).or_insert(0) += 1;
            }
        }
    }

    pub(crate) fn merge(&mut self, other: &Series) -> Result<(), String> {
        self.count = self.count.saturating_add(other.count);
        self.errors = self.errors.saturating_add(other.errors);
        self.body_bytes = self.body_bytes.saturating_add(other.body_bytes);
        self.bytes_sent = self.bytes_sent.saturating_add(other.bytes_sent);
        self.bytes_received = self.bytes_received.saturating_add(other.bytes_received);
        for (k, v) in &other.failures {
            *self.failures.entry(k.clone()).or_insert(0) += v;
        }
        self.checks_failed = self.checks_failed.saturating_add(other.checks_failed);
        for (k, v) in &other.check_failures {
            *self.check_failures.entry(*k).or_insert(0) += v;
        }
        self.latency_ns
            .add(&other.latency_ns)
            .map_err(|err| format!("histogram merge failed: {err:?}"))
    }

    pub(crate) fn to_stats(&self, elapsed_secs: f64) -> SeriesStats {
        let error_rate = if self.count == 0 {
            0.0
        } else {
            self.errors as f64 / self.count as f64
        };
        let throughput_rps = if elapsed_secs > 0.0 {
            per_sec(self.count, elapsed_secs)
        } else {
            0.0
        };

        SeriesStats {
            requests: self.count,
            errors: self.errors,
            error_rate,
            body_bytes: self.body_bytes,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            throughput_rps,
            latency: summarize_latency(&self.latency_ns),
            failures: self.failures.clone(),
            checks_failed: self.checks_failed,
            check_failures: self
                .check_failures
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect(),
        }
    }
}

fn failure_key(sample: &SampleResult) -> String {
    match (sample.http_status, sample.error) {
        (_, Some(kind)) => format!("transport:{kind}"),
        (0, None) => "transport:unknown".to_string(),
        (status, None) => format!("http_status:{status}"),
    }
}

#[derive(Debug)]
pub(crate) struct EndpointTally {
    pub(crate) path: Arc<str>,
    pub(crate) series: Series,
}

#[derive(Debug)]
pub(crate) struct Bucket {
    pub(crate) series: Series,
    pub(crate) endpoints: HashMap<KeyId, EndpointTally>,
    pub(crate) first_started: Option<Instant>,
    pub(crate) last_finished: Option<Instant>,
}

impl Bucket {
    pub(crate) fn new() -> Self {
        Self {
            series: Series::new(),
            endpoints: HashMap::new(),
            first_started: None,
            last_finished: None,
        }
    }

    /// Applies one sample to every counter of the bucket. Callers hold the bucket lock.
    pub(crate) fn record(&mut self, endpoint: KeyId, sample: &SampleResult) {
        self.series.record(sample);
        self.endpoints
            .entry(endpoint)
            .or_insert_with(|| EndpointTally {
                path: sample.workload_path.clone(),
                series: Series::new(),
            })
            .series
            .record(sample);

        let finished = sample.finished();
        self.first_started = Some(match self.first_started {
            Some(t) => t.min(sample.started),
            None => sample.started,
        });
        self.last_finished = Some(match self.last_finished {
            Some(t) => t.max(finished),
            None => finished,
        });
    }

    /// Describes the first broken invariant, if any.
    pub(crate) fn inconsistency(&self) -> Option<String> {
        let s = &self.series;
        if s.errors > s.count {
            return Some(format!("errors ({}) exceed count ({})", s.errors, s.count));
        }
        if s.checks_failed > s.count {
            return Some(format!(
                "failed checks ({}) exceed count ({})",
                s.checks_failed, s.count
            ));
        }
        if s.latency_ns.len() != s.count {
            return Some(format!(
                "histogram holds {} samples but count is {}",
                s.latency_ns.len(),
                s.count
            ));
        }
        let endpoint_total: u64 = self.endpoints.values().map(|e| e.series.count).sum();
        if endpoint_total != s.count {
            return Some(format!(
                "endpoint tallies sum to {endpoint_total} but count is {}",
                s.count
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample(success: bool, status: u16, error: Option<&'static str>) -> SampleResult {
        SampleResult {
            target: Arc::from("swoole"),
            workload_path: Arc::from("/api/cache"),
            endpoint: Arc::from("cache"),
            category: Arc::from("cache"),
            started: Instant::now(),
            latency: Duration::from_millis(5),
            http_status: status,
            success,
            body_len: 10,
            bytes_sent: 50,
            bytes_received: 120,
            error,
            failed_checks: Vec::new(),
        }
    }

    #[test]
    fn bucket_record_updates_all_counters_together() {
        let mut b = Bucket::new();
        let ep = KeyId::from(0);
        b.record(ep, &sample(true, 200, None));
        b.record(ep, &sample(false, 503, None));
        b.record(ep, &sample(false, 0, Some("timeout")));

        assert_eq!(b.series.count, 3);
        assert_eq!(b.series.errors, 2);
        assert_eq!(b.series.body_bytes, 30);
        assert_eq!(b.series.failures.get("http_status:503"), Some(&1));
        assert_eq!(b.series.failures.get("transport:timeout"), Some(&1));
        assert_eq!(b.endpoints.get(&ep).map(|e| e.series.count), Some(3));
        assert!(b.inconsistency().is_none());
    }

    #[test]
    fn inconsistency_detects_errors_above_count() {
        let mut b = Bucket::new();
        b.record(KeyId::from(0), &sample(false, 500, None));
        b.series.errors = 5;
        let detail = b.inconsistency().unwrap_or_else(|| panic!("expected inconsistency"));
        assert!(detail.contains("exceed"));
    }

    #[test]
    fn to_stats_reports_zero_rates_for_empty_series() {
        let s = Series::new().to_stats(0.0);
        assert_eq!(s.requests, 0);
        assert_eq!(s.error_rate, 0.0);
        assert_eq!(s.throughput_rps, 0.0);
        assert!(s.latency.is_none());
        assert_eq!(s.check_pass_rate(), None);
    }

    #[test]
    fn failed_checks_are_counted_per_request_and_per_name() {
        let mut b = Bucket::new();
        let ep = KeyId::from(0);
        b.record(ep, &sample(true, 200, None));
        b.record(
            ep,
            &SampleResult {
                body_len: 0,
                failed_checks: vec!["has_content"],
                ..sample(true, 200, None)
            },
        );
        b.record(
            ep,
            &SampleResult {
                failed_checks: vec!["status_ok", "has_content"],
                ..sample(false, 0, Some("connect"))
            },
        );

        let mut merged = Series::new();
        merged
            .merge(&b.series)
            .unwrap_or_else(|e| panic!("{e}"));
        let stats = merged.to_stats(1.0);
        assert_eq!(stats.checks_failed, 2);
        assert_eq!(stats.check_failures.get("has_content"), Some(&2));
        assert_eq!(stats.check_failures.get("status_ok"), Some(&1));
        let rate = stats.check_pass_rate().unwrap_or_else(|| panic!("expected pass rate"));
        assert!((rate - 1.0 / 3.0).abs() < 1e-9);
        assert!(b.inconsistency().is_none());
    }
}
