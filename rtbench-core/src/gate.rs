use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

/// Shared iteration budget and deadline for constant-VU scenarios.
#[derive(Debug)]
pub struct IterationGate {
    counter: AtomicU64,
    iterations: Option<u64>,
    duration: Option<Duration>,
    deadline: OnceLock<Instant>,
}

impl IterationGate {
    pub fn new(iterations: Option<u64>, duration: Option<Duration>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            iterations,
            duration,
            deadline: OnceLock::new(),
        }
    }

    pub fn start_at(&self, started: Instant) {
        if let Some(duration) = self.duration {
            let _ = self.deadline.set(started + duration);
        }
    }

    /// Claims the next iteration. `false` once the budget or the deadline is exhausted.
    pub fn next(&self) -> bool {
        if self.duration.is_some() {
            let now = Instant::now();
            if self.deadline.get().is_none() {
                self.start_at(now);
            }

            if let Some(deadline) = self.deadline.get()
                && now >= *deadline
            {
                return false;
            }
        }

        if let Some(total) = self.iterations {
            let idx = self.counter.fetch_add(1, Ordering::Relaxed);
            if idx >= total {
                return false;
            }
        }

        true
    }

    pub fn claimed(&self) -> u64 {
        let claimed = self.counter.load(Ordering::Relaxed);
        self.iterations.map_or(claimed, |total| claimed.min(total))
    }
}

/// One-shot broadcast flag used both for external cancellation and the runner's drain signal.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Resolves once `stop` has been called (immediately if it already was).
    pub async fn stopped(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn gate_hands_out_exactly_the_iteration_budget() {
        let gate = IterationGate::new(Some(5), None);
        let granted = (0..10).filter(|_| gate.next()).count();
        assert_eq!(granted, 5);
        assert_eq!(gate.claimed(), 5);
    }

    #[test]
    fn gate_closes_after_deadline() {
        let gate = IterationGate::new(None, Some(Duration::from_millis(10)));
        gate.start_at(Instant::now() - Duration::from_millis(20));
        assert!(!gate.next());
    }

    #[tokio::test]
    async fn stop_signal_wakes_waiters() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.stopped().await })
        };

        tokio::task::yield_now().await;
        signal.stop();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap_or_else(|_| panic!("waiter was not woken"))
            .unwrap_or_else(|e| panic!("waiter panicked: {e}"));
        assert!(signal.is_stopped());
    }

    #[tokio::test]
    async fn stopped_returns_immediately_when_already_stopped() {
        let signal = StopSignal::new();
        signal.stop();
        tokio::time::timeout(Duration::from_millis(100), signal.stopped())
            .await
            .unwrap_or_else(|_| panic!("expected immediate return"));
    }
}
