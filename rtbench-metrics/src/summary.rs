use std::collections::BTreeMap;
use std::time::Duration;

/// Latency distribution of one series, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub mean_ms: f64,
    pub stdev_ms: f64,
    pub min_ms: f64,
    pub p50_ms: f64,
    pub p75_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

/// Counters and latency of any rollup (bucket, target, category or total).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesStats {
    pub requests: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub body_bytes: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub throughput_rps: f64,
    /// `None` when the series has no samples.
    pub latency: Option<LatencySummary>,
    /// Failure breakdown: `http_status:<code>` or `transport:<kind>` to count.
    pub failures: BTreeMap<String, u64>,
    /// Requests that failed at least one response check.
    pub checks_failed: u64,
    /// Failed response checks by check name.
    pub check_failures: BTreeMap<String, u64>,
}

impl SeriesStats {
    pub fn mean_latency_ms(&self) -> Option<f64> {
        self.latency.as_ref().map(|l| l.mean_ms)
    }

    /// Share of requests that passed every response check; `None` without requests.
    pub fn check_pass_rate(&self) -> Option<f64> {
        (self.requests > 0)
            .then(|| self.requests.saturating_sub(self.checks_failed) as f64 / self.requests as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketSummary {
    pub target: String,
    pub category: String,
    pub stats: SeriesStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetSummary {
    pub target: String,
    pub stats: SeriesStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub stats: SeriesStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSummary {
    pub target: String,
    pub category: String,
    pub endpoint: String,
    pub path: String,
    pub stats: SeriesStats,
}

/// Requests-per-second sampled once per progress interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RpsSummary {
    pub samples: u64,
    pub avg: f64,
    pub stdev: f64,
    pub max: f64,
}

/// Point-in-time view of everything the aggregator has recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub elapsed: Duration,
    /// Relative error bound of every reported percentile.
    pub latency_error_bound: f64,
    /// Ordered by target, then category name.
    pub buckets: Vec<BucketSummary>,
    /// Declared targets first (in declaration order), then first-seen order.
    pub targets: Vec<TargetSummary>,
    /// Ordered by category name.
    pub categories: Vec<CategorySummary>,
    pub endpoints: Vec<EndpointSummary>,
    pub totals: SeriesStats,
    pub rps: RpsSummary,
}

impl RunSummary {
    pub fn target(&self, name: &str) -> Option<&TargetSummary> {
        self.targets.iter().find(|t| t.target == name)
    }

    pub fn category(&self, name: &str) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.category == name)
    }

    /// Rows for `endpoint` across every target that served it.
    pub fn endpoint_rows<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> impl Iterator<Item = &'a EndpointSummary> + 'a {
        self.endpoints.iter().filter(move |e| e.endpoint == endpoint)
    }

    pub fn bucket(&self, target: &str, category: &str) -> Option<&BucketSummary> {
        self.buckets
            .iter()
            .find(|b| b.target == target && b.category == category)
    }
}
