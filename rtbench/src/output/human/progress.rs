use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// One live line per scenario on stderr: a bar when the scenario has a scheduled duration,
/// a spinner otherwise.
pub(crate) struct HumanProgress {
    multi: MultiProgress,
    lines: Mutex<HashMap<String, ProgressBar>>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
        Self {
            multi,
            lines: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn update(
        &self,
        scenario: &str,
        scheduled: Option<Duration>,
        elapsed: Duration,
        message: String,
    ) {
        let mut lines = self
            .lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let line = lines
            .entry(scenario.to_string())
            .or_insert_with(|| self.new_line(scenario, scheduled));
        line.set_message(message);

        if let Some(total) = scheduled {
            let total_ms = total.as_millis() as u64;
            line.set_length(total_ms);
            line.set_position((elapsed.as_millis() as u64).min(total_ms));
        }
    }

    /// Clears every line so the summary prints on a clean terminal.
    pub(crate) fn finish(&self) {
        let mut lines = self
            .lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, line) in lines.drain() {
            line.finish_and_clear();
        }
        let _ = self.multi.clear();
    }

    fn new_line(&self, scenario: &str, scheduled: Option<Duration>) -> ProgressBar {
        let line = match scheduled {
            Some(_) => {
                let pb = self.multi.add(ProgressBar::new(0));
                pb.set_style(bar_style());
                pb
            }
            None => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(spinner_style());
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            }
        };
        line.set_prefix(scenario.to_string());
        line
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} {spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
