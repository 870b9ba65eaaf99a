use std::time::Duration;

use crate::error::{Error, Result};

/// Drain budget applied when a scenario does not set one.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// One segment of a ramp profile: move toward `target` VUs over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioStage {
    pub duration: Duration,
    pub target: u64,
}

impl ScenarioStage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Run-shape overrides coming from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub iterations: Option<u64>,
    pub vus: Option<u64>,
    pub duration: Option<Duration>,
}

impl RunConfig {
    fn overrides_set(&self) -> bool {
        self.vus.is_some() || self.iterations.is_some() || self.duration.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioExecutor {
    ConstantVus {
        vus: u64,
    },

    /// Ramp the number of active VUs up/down over time.
    RampingVus {
        start_vus: u64,
        stages: Vec<ScenarioStage>,
    },
}

/// Scenario executor kind (the string form used in config files).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
pub enum ScenarioExecutorKind {
    #[strum(serialize = "constant-vus", serialize = "constant")]
    ConstantVus,

    #[strum(serialize = "ramping-vus")]
    RampingVus,
}

/// Scenario as written in a config file, before validation.
#[derive(Debug, Clone, Default)]
pub struct ScenarioOptions {
    pub name: String,

    /// If missing, defaults to constant VUs.
    pub executor: Option<String>,

    pub vus: Option<u64>,
    pub iterations: Option<u64>,
    pub duration: Option<Duration>,

    // Ramping VUs
    pub start_vus: Option<u64>,
    pub stages: Vec<ScenarioStage>,

    pub graceful_stop: Option<Duration>,
    pub max_duration: Option<Duration>,
}

/// Validated scenario, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub name: String,
    pub executor: ScenarioExecutor,
    /// Shared iteration budget across all VUs (constant-vus only).
    pub iterations: Option<u64>,
    pub duration: Option<Duration>,
    pub graceful_stop: Duration,
    pub max_duration: Option<Duration>,
}

impl ScenarioConfig {
    /// Stage-driven scenario with no start VUs, as used by the programmatic entry point.
    pub fn from_stages(name: &str, stages: Vec<ScenarioStage>) -> Result<Self> {
        scenario_from_options(
            ScenarioOptions {
                name: name.to_string(),
                executor: Some(ScenarioExecutorKind::RampingVus.to_string()),
                stages,
                ..ScenarioOptions::default()
            },
            &RunConfig::default(),
        )
    }

    /// Number of VU tasks the scenario needs at its peak.
    pub fn max_vus(&self) -> u64 {
        match &self.executor {
            ScenarioExecutor::ConstantVus { vus } => *vus,
            ScenarioExecutor::RampingVus { start_vus, stages } => {
                let max_stage = stages.iter().map(|st| st.target).max().unwrap_or(0);
                max_stage.max(*start_vus)
            }
        }
    }
}

fn total_duration(stages: &[ScenarioStage]) -> Duration {
    stages
        .iter()
        .fold(Duration::ZERO, |acc, st| acc.saturating_add(st.duration))
}

pub fn scenario_from_options(s: ScenarioOptions, cfg: &RunConfig) -> Result<ScenarioConfig> {
    let executor_name = s.executor.as_deref().unwrap_or("constant-vus");
    let executor_kind: ScenarioExecutorKind =
        executor_name.parse().map_err(|_| Error::InvalidExecutor)?;
    let graceful_stop = s.graceful_stop.unwrap_or(DEFAULT_GRACEFUL_STOP);

    // Command-line run shape wins over ramping profiles: the scenario becomes constant-vus.
    if cfg.overrides_set() || executor_kind == ScenarioExecutorKind::ConstantVus {
        let vus = cfg.vus.or(s.vus).unwrap_or(1);
        if vus == 0 {
            return Err(Error::InvalidVus);
        }

        let duration = cfg.duration.or(s.duration);
        let iterations = cfg
            .iterations
            .or(s.iterations)
            .or(if duration.is_none() { Some(1) } else { None });
        if iterations == Some(0) {
            return Err(Error::InvalidIterations);
        }

        return Ok(ScenarioConfig {
            name: s.name,
            executor: ScenarioExecutor::ConstantVus { vus },
            iterations,
            duration,
            graceful_stop,
            max_duration: s.max_duration,
        });
    }

    if s.iterations.is_some() {
        return Err(Error::InvalidIterations);
    }
    if s.stages.is_empty() {
        return Err(Error::InvalidStages);
    }

    let start_vus = s.start_vus.unwrap_or(0);
    let max_stage = s.stages.iter().map(|st| st.target).max().unwrap_or(0);
    if max_stage.max(start_vus) == 0 {
        return Err(Error::InvalidVus);
    }

    let total = total_duration(&s.stages);
    if total.is_zero() {
        return Err(Error::InvalidStages);
    }

    Ok(ScenarioConfig {
        name: s.name,
        executor: ScenarioExecutor::RampingVus {
            start_vus,
            stages: s.stages,
        },
        iterations: None,
        duration: Some(total),
        graceful_stop,
        max_duration: s.max_duration,
    })
}

/// Validates every scenario. With none declared, a single `default` scenario is built from `cfg`.
pub fn scenarios_from_options(
    scenarios: Vec<ScenarioOptions>,
    cfg: RunConfig,
) -> Result<Vec<ScenarioConfig>> {
    if scenarios.is_empty() {
        let s = ScenarioOptions {
            name: "default".to_string(),
            ..ScenarioOptions::default()
        };
        return Ok(vec![scenario_from_options(s, &cfg)?]);
    }

    scenarios
        .into_iter()
        .map(|s| scenario_from_options(s, &cfg))
        .collect()
}
