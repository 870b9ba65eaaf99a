use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rtbench_metrics::Aggregator;

use crate::catalog::WorkloadCatalog;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::gate::{IterationGate, StopSignal};
use crate::pacing::PacingPolicy;
use crate::registry::TargetRegistry;
use crate::schedule::RampingSchedule;
use crate::selection::TargetPicker;

#[derive(Debug, Clone)]
pub(crate) enum VuWork {
    Constant { gate: Arc<IterationGate> },
    RampingVus { schedule: Arc<RampingSchedule> },
}

pub(crate) struct VuContext<E> {
    /// 1-based index within the scenario; ramping VUs are active while `vu_id <= target`.
    pub(crate) vu_id: u64,
    pub(crate) work: VuWork,
    pub(crate) started: Instant,
    pub(crate) rng: StdRng,
    pub(crate) targets: Arc<TargetRegistry>,
    pub(crate) catalog: Arc<WorkloadCatalog>,
    pub(crate) executor: Arc<E>,
    pub(crate) pacing: Arc<PacingPolicy>,
    pub(crate) picker: Arc<TargetPicker>,
    pub(crate) aggregator: Arc<Aggregator>,
    pub(crate) drain: Arc<StopSignal>,
    pub(crate) active: Arc<AtomicU64>,
}

/// Sleeps for `d` unless draining starts first. Returns `false` when interrupted.
async fn pause(drain: &StopSignal, d: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(d) => true,
        _ = drain.stopped() => false,
    }
}

pub(crate) async fn run_vu<E: Executor>(mut ctx: VuContext<E>) -> Result<()> {
    loop {
        if ctx.drain.is_stopped() {
            break;
        }

        match &ctx.work {
            VuWork::Constant { gate } => {
                if !gate.next() {
                    break;
                }
            }
            VuWork::RampingVus { schedule } => {
                let elapsed = ctx.started.elapsed();
                if schedule.is_done(elapsed) {
                    break;
                }

                if ctx.vu_id > schedule.current_concurrency(elapsed) {
                    let wait = schedule.next_recheck_in(elapsed, ctx.vu_id);
                    if !pause(&ctx.drain, wait.max(Duration::from_millis(1))).await {
                        break;
                    }
                    continue;
                }
            }
        }

        let category = iterate(&mut ctx).await?;

        let delay = ctx.pacing.delay_for(&category, &mut ctx.rng);
        if !delay.is_zero() && !pause(&ctx.drain, delay).await {
            break;
        }
    }

    Ok(())
}

/// One pick-execute-record cycle. Returns the workload category for pacing.
async fn iterate<E: Executor>(ctx: &mut VuContext<E>) -> Result<String> {
    let target = ctx
        .picker
        .pick(ctx.targets.all(), &mut ctx.rng)
        .ok_or(Error::NoTargets)?;
    let workload = ctx.catalog.pick_weighted(&mut ctx.rng)?;

    ctx.active.fetch_add(1, Ordering::Relaxed);
    let sample = ctx.executor.execute(target, workload).await;
    ctx.active.fetch_sub(1, Ordering::Relaxed);

    ctx.aggregator.record(sample);
    Ok(workload.category.clone())
}
