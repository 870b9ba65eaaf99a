mod catalog;
mod checks;
mod config;
mod error;
mod executor;
mod gate;
mod http;
mod pacing;
mod preflight;
mod progress;
mod registry;
mod report;
mod run;
mod schedule;
mod selection;
mod thresholds;
mod vu;

pub use catalog::{DEFAULT_WORKLOAD_TIMEOUT, WorkloadCatalog, WorkloadDefinition, WorkloadMethod};
pub use checks::{ResponseCheck, SLOW_RESPONSE_LIMIT, failed_checks};
pub use config::{
    DEFAULT_GRACEFUL_STOP, RunConfig, ScenarioConfig, ScenarioExecutor, ScenarioExecutorKind,
    ScenarioOptions, ScenarioStage, scenario_from_options, scenarios_from_options,
};
pub use error::{Error, Result};
pub use executor::{Executor, HttpExecutor, blank_sample};
pub use gate::{IterationGate, StopSignal};
pub use http::{
    Error as HttpError, HttpClient, HttpRequest, HttpResponse, HttpTransportErrorKind,
    estimate_http_request_bytes,
};
pub use pacing::{Pacing, PacingPolicy};
pub use preflight::{
    DEFAULT_PREFLIGHT_PATH, DEFAULT_PREFLIGHT_TIMEOUT, Preflight, TargetHealth, check_targets,
    run_preflight,
};
pub use progress::{DEFAULT_PROGRESS_INTERVAL, ProgressFn, ProgressUpdate};
pub use registry::{Target, TargetRegistry};
pub use report::{
    CategoryComparison, EndpointReport, RankEntry, Report, RpsReport, SeriesReport, TargetReport,
    render,
};
pub use run::{Runner, run_scenario};
pub use schedule::{
    PhaseTracker, RampingSchedule, SchedulerState, StageSnapshot, current_concurrency,
};
pub use selection::TargetSelection;
pub use thresholds::{
    ThresholdAgg, ThresholdError, ThresholdExpr, ThresholdKey, ThresholdMetric, ThresholdOp,
    ThresholdSelector, ThresholdSet, ThresholdViolation, evaluate_thresholds,
    parse_threshold_expr, parse_threshold_key, validate_thresholds,
};

pub use rtbench_metrics::{
    Aggregator, LATENCY_PERCENTILE_RELATIVE_ERROR, LatencySummary, RunSummary, SampleResult,
    SeriesStats,
};
