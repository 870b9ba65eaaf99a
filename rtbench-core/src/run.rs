use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rtbench_metrics::{Aggregator, RunSummary, per_sec};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::catalog::WorkloadCatalog;
use crate::config::{ScenarioConfig, ScenarioExecutor, ScenarioStage};
use crate::error::{Error, Result};
use crate::executor::{Executor, HttpExecutor};
use crate::gate::{IterationGate, StopSignal};
use crate::http::HttpClient;
use crate::pacing::PacingPolicy;
use crate::preflight::{Preflight, run_preflight};
use crate::progress::{DEFAULT_PROGRESS_INTERVAL, ProgressFn, ProgressUpdate};
use crate::registry::TargetRegistry;
use crate::schedule::{PhaseTracker, RampingSchedule, SchedulerState};
use crate::selection::{TargetPicker, TargetSelection};
use crate::vu::{VuContext, VuWork, run_vu};

/// Runs `stages` against every target with round-robin selection and the default HTTP executor.
pub async fn run_scenario(
    targets: Arc<TargetRegistry>,
    catalog: Arc<WorkloadCatalog>,
    stages: Vec<ScenarioStage>,
    pacing: PacingPolicy,
) -> Result<RunSummary> {
    let scenario = ScenarioConfig::from_stages("default", stages)?;
    Runner::new(targets, catalog)
        .pacing(pacing)
        .run(&scenario)
        .await
}

/// Configurable scenario runner.
pub struct Runner<E = HttpExecutor> {
    targets: Arc<TargetRegistry>,
    catalog: Arc<WorkloadCatalog>,
    executor: Arc<E>,
    pacing: Arc<PacingPolicy>,
    selection: TargetSelection,
    seed: Option<u64>,
    stop: Arc<StopSignal>,
    progress: Option<ProgressFn>,
    progress_interval: Duration,
    preflight: Option<Preflight>,
}

impl Runner<HttpExecutor> {
    pub fn new(targets: Arc<TargetRegistry>, catalog: Arc<WorkloadCatalog>) -> Self {
        Self {
            targets,
            catalog,
            executor: Arc::new(HttpExecutor::default()),
            pacing: Arc::new(PacingPolicy::default()),
            selection: TargetSelection::default(),
            seed: None,
            stop: Arc::new(StopSignal::new()),
            progress: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            preflight: None,
        }
    }
}

impl<E: Executor> Runner<E> {
    pub fn with_executor<E2: Executor>(self, executor: E2) -> Runner<E2> {
        Runner {
            targets: self.targets,
            catalog: self.catalog,
            executor: Arc::new(executor),
            pacing: self.pacing,
            selection: self.selection,
            seed: self.seed,
            stop: self.stop,
            progress: self.progress,
            progress_interval: self.progress_interval,
            preflight: self.preflight,
        }
    }

    #[must_use]
    pub fn pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = Arc::new(pacing);
        self
    }

    #[must_use]
    pub fn target_selection(mut self, selection: TargetSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Base seed; VU `n` draws from `StdRng::seed_from_u64(seed + n)`.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// External cancellation: stopping it drains the current scenario.
    #[must_use]
    pub fn stop_signal(mut self, stop: Arc<StopSignal>) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub fn progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    #[must_use]
    pub fn preflight(mut self, preflight: Preflight) -> Self {
        self.preflight = Some(preflight);
        self
    }

    pub async fn run(&self, scenario: &ScenarioConfig) -> Result<RunSummary> {
        if self.targets.is_empty() {
            return Err(Error::NoTargets);
        }
        if self.catalog.is_empty() {
            return Err(Error::EmptyCatalog);
        }

        if let Some(preflight) = &self.preflight {
            run_preflight(&HttpClient::default(), &self.targets, preflight).await?;
        }

        let seed = self.seed.unwrap_or_else(rand::random);
        let max_vus = scenario.max_vus();
        tracing::info!(
            scenario = %scenario.name,
            max_vus,
            seed,
            targets = self.targets.len(),
            workloads = self.catalog.len(),
            "starting scenario"
        );

        let aggregator = Arc::new(Aggregator::new());
        for t in self.targets.all() {
            aggregator.declare_target(&t.name);
        }

        let (work, schedule) = match &scenario.executor {
            ScenarioExecutor::ConstantVus { vus } => {
                let gate = Arc::new(IterationGate::new(scenario.iterations, scenario.duration));
                let schedule = scenario
                    .duration
                    .map(|d| Arc::new(RampingSchedule::constant(*vus, d)));
                (VuWork::Constant { gate }, schedule)
            }
            ScenarioExecutor::RampingVus { start_vus, stages } => {
                let schedule = Arc::new(RampingSchedule::new(*start_vus, stages.clone()));
                (
                    VuWork::RampingVus {
                        schedule: schedule.clone(),
                    },
                    Some(schedule),
                )
            }
        };

        let deadline = [
            schedule.as_ref().map(|s| s.total_duration()),
            scenario.max_duration,
        ]
        .into_iter()
        .flatten()
        .min();

        let drain = Arc::new(StopSignal::new());
        let phase = Arc::new(PhaseTracker::new());
        let active = Arc::new(AtomicU64::new(0));
        let picker = Arc::new(TargetPicker::new(self.selection));

        let started = Instant::now();
        if let VuWork::Constant { gate } = &work {
            gate.start_at(started);
        }
        aggregator.mark_started();
        phase.advance(state_at(schedule.as_deref(), Duration::ZERO, false));

        let mut vus = JoinSet::new();
        for vu_id in 1..=max_vus {
            vus.spawn(run_vu(VuContext {
                vu_id,
                work: work.clone(),
                started,
                rng: StdRng::seed_from_u64(seed.wrapping_add(vu_id)),
                targets: self.targets.clone(),
                catalog: self.catalog.clone(),
                executor: self.executor.clone(),
                pacing: self.pacing.clone(),
                picker: picker.clone(),
                aggregator: aggregator.clone(),
                drain: drain.clone(),
                active: active.clone(),
            }));
        }

        let watchdog = {
            let stop = self.stop.clone();
            let drain = drain.clone();
            tokio::spawn(async move {
                let budget = async {
                    match deadline {
                        Some(d) => tokio::time::sleep_until((started + d).into()).await,
                        None => std::future::pending::<()>().await,
                    }
                };
                tokio::select! {
                    _ = stop.stopped() => tracing::info!("stop requested"),
                    _ = budget => {}
                }
                drain.stop();
            })
        };

        let ticker = tokio::spawn(progress_loop(ProgressLoop {
            scenario: scenario.name.clone(),
            interval: self.progress_interval,
            started,
            schedule: schedule.clone(),
            aggregator: aggregator.clone(),
            phase: phase.clone(),
            drain: drain.clone(),
            active: active.clone(),
            progress: self.progress.clone(),
        }));

        let outcome = join_vus(&mut vus, &drain, &phase, scenario.graceful_stop).await;

        drain.stop();
        watchdog.abort();
        ticker.abort();
        let _ = watchdog.await;
        let _ = ticker.await;

        aggregator.mark_finished();
        if phase.advance(SchedulerState::Completed) {
            let iterations = match &work {
                VuWork::Constant { gate } => Some(gate.claimed()),
                VuWork::RampingVus { .. } => None,
            };
            tracing::info!(
                scenario = %scenario.name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                iterations = ?iterations,
                "scenario completed"
            );
        }
        outcome?;

        Ok(aggregator.snapshot()?)
    }
}

/// Waits for VUs to finish on their own; once draining starts, gives them `graceful_stop`
/// to complete in-flight iterations and aborts the rest.
async fn join_vus(
    vus: &mut JoinSet<Result<()>>,
    drain: &StopSignal,
    phase: &PhaseTracker,
    graceful_stop: Duration,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            res = vus.join_next() => match res {
                Some(res) => res??,
                None => return Ok(()),
            },
            _ = drain.stopped() => break,
        }
    }

    if phase.advance(SchedulerState::Draining) {
        tracing::info!(in_flight = vus.len(), "draining");
    }

    let drained = tokio::time::timeout(graceful_stop, async {
        while let Some(res) = vus.join_next().await {
            res??;
        }
        Ok::<(), Error>(())
    })
    .await;

    match drained {
        Ok(res) => res,
        Err(_) => {
            tracing::warn!(
                remaining = vus.len(),
                graceful_stop_ms = graceful_stop.as_millis() as u64,
                "graceful stop expired; aborting remaining VUs"
            );
            vus.abort_all();
            while vus.join_next().await.is_some() {}
            Ok(())
        }
    }
}

fn state_at(schedule: Option<&RampingSchedule>, elapsed: Duration, draining: bool) -> SchedulerState {
    match schedule {
        Some(s) => s.state_at(elapsed, draining),
        None if draining => SchedulerState::Draining,
        None => SchedulerState::Running {
            stage_index: 0,
            stage_elapsed: elapsed,
        },
    }
}

struct ProgressLoop {
    scenario: String,
    interval: Duration,
    started: Instant,
    schedule: Option<Arc<RampingSchedule>>,
    aggregator: Arc<Aggregator>,
    phase: Arc<PhaseTracker>,
    drain: Arc<StopSignal>,
    active: Arc<AtomicU64>,
    progress: Option<ProgressFn>,
}

async fn progress_loop(p: ProgressLoop) {
    let mut interval = tokio::time::interval_at(
        (p.started + p.interval).into(),
        p.interval.max(Duration::from_millis(1)),
    );
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut tick: u64 = 0;
    let mut last_at = p.started;
    let (mut last_requests, mut last_errors) = (0u64, 0u64);

    loop {
        interval.tick().await;

        tick = tick.saturating_add(1);
        let now = Instant::now();
        let dt = now.duration_since(last_at).as_secs_f64();
        last_at = now;
        let elapsed = now.duration_since(p.started);

        let (requests_total, errors_total) = p.aggregator.request_count();
        let delta_req = requests_total.saturating_sub(last_requests);
        let delta_err = errors_total.saturating_sub(last_errors);
        (last_requests, last_errors) = (requests_total, errors_total);

        let rps_now = per_sec(delta_req, dt);
        p.aggregator.record_rps_sample(rps_now);

        let state = state_at(p.schedule.as_deref(), elapsed, p.drain.is_stopped());
        if p.phase.advance(state)
            && let SchedulerState::Running { stage_index, .. } = state
        {
            tracing::info!(scenario = %p.scenario, stage = stage_index + 1, "entering stage");
        }

        let Some(progress) = &p.progress else {
            continue;
        };

        let error_rate_now = if delta_req == 0 {
            0.0
        } else {
            delta_err as f64 / delta_req as f64
        };

        (progress)(ProgressUpdate {
            tick,
            elapsed,
            scenario: p.scenario.clone(),
            state: p.phase.current(),
            total_duration: p.schedule.as_ref().map(|s| s.total_duration()),
            stage: p.schedule.as_ref().and_then(|s| s.stage_snapshot_at(elapsed)),
            target_vus: p
                .schedule
                .as_ref()
                .map_or(0, |s| s.current_concurrency(elapsed)),
            active_vus: p.active.load(Ordering::Relaxed),
            requests_total,
            errors_total,
            rps_now,
            error_rate_now,
        });
    }
}
