use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one executed request.
///
/// Built by the request executor and handed to [`crate::Aggregator::record`], which takes
/// ownership of it.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    pub target: Arc<str>,
    pub workload_path: Arc<str>,
    /// Endpoint label used in reports (the workload name, or its path).
    pub endpoint: Arc<str>,
    pub category: Arc<str>,
    pub started: Instant,
    pub latency: Duration,
    /// HTTP status code, or `0` when no response was received.
    pub http_status: u16,
    pub success: bool,
    pub body_len: u64,
    /// Estimated bytes sent on the wire.
    pub bytes_sent: u64,
    /// Estimated bytes received on the wire.
    pub bytes_received: u64,
    /// Transport failure kind (e.g. `timeout`), set only when no response was received.
    pub error: Option<&'static str>,
    /// Names of the response checks this sample failed; empty when every check passed.
    pub failed_checks: Vec<&'static str>,
}

impl SampleResult {
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }

    pub fn checks_passed(&self) -> bool {
        self.failed_checks.is_empty()
    }

    pub(crate) fn finished(&self) -> Instant {
        self.started + self.latency
    }
}
