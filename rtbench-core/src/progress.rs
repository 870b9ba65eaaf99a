use std::sync::Arc;
use std::time::Duration;

use crate::schedule::{SchedulerState, StageSnapshot};

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based).
    pub tick: u64,
    pub elapsed: Duration,
    pub scenario: String,
    pub state: SchedulerState,
    /// Scheduled duration of the scenario, when it has one.
    pub total_duration: Option<Duration>,
    pub stage: Option<StageSnapshot>,
    /// VU count the profile asks for right now.
    pub target_vus: u64,
    /// VUs currently executing an iteration.
    pub active_vus: u64,
    pub requests_total: u64,
    pub errors_total: u64,
    /// Requests/sec observed during the last interval.
    pub rps_now: f64,
    /// Failed / total requests during the last interval (0..=1).
    pub error_rate_now: f64,
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
