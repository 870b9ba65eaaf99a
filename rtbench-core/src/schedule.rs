use std::sync::Mutex;
use std::time::Duration;

use crate::config::ScenarioStage;

/// Lifecycle of a scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running {
        stage_index: usize,
        stage_elapsed: Duration,
    },
    /// No new iterations start; in-flight ones may finish.
    Draining,
    Completed,
}

impl SchedulerState {
    fn rank(&self) -> (u8, usize) {
        match self {
            Self::Idle => (0, 0),
            Self::Running { stage_index, .. } => (1, *stage_index),
            Self::Draining => (2, 0),
            Self::Completed => (3, 0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running { .. } => "running",
            Self::Draining => "draining",
            Self::Completed => "completed",
        }
    }
}

/// Live scheduler state shared by the runner's tasks. Never moves backwards.
#[derive(Debug)]
pub struct PhaseTracker {
    state: Mutex<SchedulerState>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            state: Mutex::new(SchedulerState::Idle),
        }
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SchedulerState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Moves to `next` unless that would go back in the lifecycle.
    ///
    /// Returns `true` when the phase (or the running stage) changed; refreshing `stage_elapsed`
    /// within the same stage is applied silently and returns `false`.
    pub fn advance(&self, next: SchedulerState) -> bool {
        let mut cur = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let (cur_rank, next_rank) = (cur.rank(), next.rank());
        if next_rank < cur_rank {
            return false;
        }
        let changed = next_rank != cur_rank;
        *cur = next;
        changed
    }
}

#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

/// Piecewise-linear VU target over time.
#[derive(Debug, Clone)]
pub struct RampingSchedule {
    start: u64,
    stages: Vec<ScenarioStage>,
    cumulative_ends: Vec<Duration>,
}

/// Target concurrency at `elapsed` for a profile that starts from zero VUs.
pub fn current_concurrency(stages: &[ScenarioStage], elapsed: Duration) -> u64 {
    RampingSchedule::new(0, stages.to_vec()).current_concurrency(elapsed)
}

impl RampingSchedule {
    pub fn new(start: u64, stages: Vec<ScenarioStage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    /// A flat profile holding `vus` for `duration`.
    pub fn constant(vus: u64, duration: Duration) -> Self {
        Self::new(vus, vec![ScenarioStage::new(duration, vus)])
    }

    pub fn stages(&self) -> &[ScenarioStage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    /// Index of the stage covering `elapsed` (a boundary belongs to the stage it ends).
    fn stage_index_at(&self, elapsed: Duration) -> usize {
        self.cumulative_ends
            .partition_point(|end| *end < elapsed)
            .min(self.stages.len().saturating_sub(1))
    }

    fn stage_bounds(&self, idx: usize) -> (Duration, Duration) {
        let stage_start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };
        (stage_start, self.cumulative_ends[idx])
    }

    fn start_target_of(&self, idx: usize) -> u64 {
        if idx == 0 {
            self.start
        } else {
            self.stages[idx - 1].target
        }
    }

    pub fn current_concurrency(&self, elapsed: Duration) -> u64 {
        if self.stages.is_empty() {
            return self.start;
        }

        if elapsed >= self.total_duration() {
            return self.stages.last().map(|s| s.target).unwrap_or(self.start);
        }

        let idx = self.stage_index_at(elapsed);
        let (stage_start, stage_end) = self.stage_bounds(idx);
        let stage_duration = stage_end.saturating_sub(stage_start);
        let stage_elapsed = elapsed.saturating_sub(stage_start);

        let start_target = self.start_target_of(idx);
        let end_target = self.stages[idx].target;

        if stage_duration.is_zero() {
            // Zero-length stages ending at the same instant step straight to the last of them.
            let last = self
                .cumulative_ends
                .partition_point(|end| *end <= elapsed)
                .saturating_sub(1);
            return self.stages.get(last).map_or(end_target, |s| s.target);
        }

        let start_i = start_target as i128;
        let delta = end_target as i128 - start_i;

        let num = stage_elapsed.as_nanos() as i128;
        let den = stage_duration.as_nanos() as i128;

        let cur = start_i + (delta.saturating_mul(num) / den.max(1));
        cur.clamp(0, u64::MAX as i128) as u64
    }

    /// Pure view of the lifecycle at `elapsed`. `Idle` and `Completed` are owned by the runner.
    pub fn state_at(&self, elapsed: Duration, stopped: bool) -> SchedulerState {
        if stopped || self.stages.is_empty() || elapsed >= self.total_duration() {
            return SchedulerState::Draining;
        }

        let idx = self
            .cumulative_ends
            .partition_point(|end| *end <= elapsed)
            .min(self.stages.len() - 1);
        let (stage_start, _) = self.stage_bounds(idx);
        SchedulerState::Running {
            stage_index: idx,
            stage_elapsed: elapsed.saturating_sub(stage_start),
        }
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        if self.stages.is_empty() {
            return None;
        }

        let clamped = elapsed.min(self.total_duration());
        let idx = self.stage_index_at(clamped);
        let (stage_start, stage_end) = self.stage_bounds(idx);

        let stage_duration = stage_end.saturating_sub(stage_start);
        let stage_elapsed = clamped.saturating_sub(stage_start);

        Some(StageSnapshot {
            index: idx,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: stage_duration.saturating_sub(stage_elapsed),
            start_target: self.start_target_of(idx),
            end_target: self.stages[idx].target,
            current_target: self.current_concurrency(clamped),
        })
    }

    /// How long an inactive VU (1-based `vu_index`) can sleep before the ramp may need it.
    pub fn next_recheck_in(&self, elapsed: Duration, vu_index: u64) -> Duration {
        let default_sleep = Duration::from_millis(50);

        if self.stages.is_empty() {
            return default_sleep;
        }
        if elapsed >= self.total_duration() {
            return Duration::ZERO;
        }

        if vu_index <= self.current_concurrency(elapsed) {
            return Duration::from_millis(1);
        }

        let idx = self.stage_index_at(elapsed);
        let (stage_start, stage_end) = self.stage_bounds(idx);
        let start_target = self.start_target_of(idx);
        let end_target = self.stages[idx].target;

        // Flat or shrinking stage: nothing changes for this VU until the stage ends.
        if end_target <= start_target || vu_index > end_target {
            return stage_end.saturating_sub(elapsed).min(default_sleep);
        }

        // Solve start + (end-start)*t/dur >= vu_index for t.
        let start_i = start_target as i128;
        let delta = end_target as i128 - start_i;
        let want = vu_index as i128;
        if want <= start_i {
            return Duration::ZERO;
        }

        let stage_ns = stage_end.saturating_sub(stage_start).as_nanos() as i128;
        let elapsed_ns = elapsed.saturating_sub(stage_start).as_nanos() as i128;

        let needed_ns = ((want - start_i).saturating_mul(stage_ns) / delta).max(0);
        let wait_ns = needed_ns.saturating_sub(elapsed_ns).max(0);
        let wait = Duration::from_nanos(wait_ns.min(u64::MAX as i128) as u64);

        wait.min(default_sleep)
    }
}
