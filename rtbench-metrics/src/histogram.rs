use hdrhistogram::Histogram;

use crate::summary::LatencySummary;

/// Significant decimal digits kept by every latency histogram.
pub const LATENCY_SIGNIFICANT_DIGITS: u8 = 3;

/// Upper bound on the relative error of any reported latency percentile.
///
/// Latencies are recorded in nanoseconds into HDR histograms with
/// [`LATENCY_SIGNIFICANT_DIGITS`] significant digits, so a reported value is within
/// 0.1% of the true sample value at that rank, down to single-nanosecond latencies.
/// Merging histograms is exact and adds no error.
pub const LATENCY_PERCENTILE_RELATIVE_ERROR: f64 = 0.001;

/// Highest trackable latency: one hour in nanoseconds. Larger values saturate.
const MAX_LATENCY_NS: u64 = 3_600_000_000_000;

const NS_PER_MS: f64 = 1_000_000.0;

/// Histogram value for `latency`. Zero is recorded as the lowest trackable value.
pub(crate) fn latency_value(latency: std::time::Duration) -> u64 {
    u64::try_from(latency.as_nanos())
        .unwrap_or(u64::MAX)
        .max(1)
}

pub(crate) fn new_latency_histogram() -> Histogram<u64> {
    match Histogram::<u64>::new_with_bounds(1, MAX_LATENCY_NS, LATENCY_SIGNIFICANT_DIGITS) {
        Ok(h) => h,
        Err(err) => panic!("failed to create histogram: {err}"),
    }
}

pub(crate) fn summarize_latency(h: &Histogram<u64>) -> Option<LatencySummary> {
    let count = h.len();
    if count == 0 {
        return None;
    }

    let ns_to_ms = |v: u64| v as f64 / NS_PER_MS;

    Some(LatencySummary {
        count,
        mean_ms: h.mean() / NS_PER_MS,
        stdev_ms: h.stdev() / NS_PER_MS,
        min_ms: ns_to_ms(h.min()),
        p50_ms: ns_to_ms(h.value_at_quantile(0.50)),
        p75_ms: ns_to_ms(h.value_at_quantile(0.75)),
        p90_ms: ns_to_ms(h.value_at_quantile(0.90)),
        p95_ms: ns_to_ms(h.value_at_quantile(0.95)),
        p99_ms: ns_to_ms(h.value_at_quantile(0.99)),
        max_ms: ns_to_ms(h.max()),
    })
}
