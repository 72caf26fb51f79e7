use std::sync::Mutex;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

/// Completion counter shared by every worker of a batch.
///
/// `record` bumps the counter and renders the status line inside one critical
/// section, so the line always matches the count it reports.
pub struct Progress {
    completed: Mutex<usize>,
    total: usize,
    started_at: Instant,
    bar: ProgressBar,
}

impl Progress {
    pub fn new(total: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{spinner:.blue} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    // For more spinners check out the cli-spinners project:
                    // https://github.com/sindresorhus/cli-spinners/blob/master/spinners.json
                    .tick_strings(&[
                        "□ □ □ □ □",
                        "■ □ □ □ □",
                        "□ ■ □ □ □",
                        "□ □ ■ □ □",
                        "□ □ □ ■ □",
                        "□ □ □ □ ■",
                        "■ ■ ■ ■ ■",
                    ]),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar.set_message(format!("0 of {total} files downloaded"));
            bar
        };

        Progress { completed: Mutex::new(0), total, started_at: Instant::now(), bar }
    }

    /// Marks one more task as terminal and returns the new count.
    pub fn record(&self) -> usize {
        let mut completed = self.completed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *completed += 1;

        let line = status_line(*completed, self.total, self.started_at.elapsed());
        self.bar.set_position(*completed as u64);
        self.bar.set_message(line.clone());
        debug!("{line}");

        *completed
    }

    /// Prints `line` on stderr regardless of quiet mode or log filters.
    pub fn notice(&self, line: &str) {
        self.bar.suspend(|| eprintln!("{line}"));
    }

    #[cfg(test)]
    pub(crate) fn completed(&self) -> usize {
        *self.completed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn finish(&self, message: String) {
        self.bar.finish_with_message(message);
    }

    pub fn abandon(&self, message: String) {
        self.bar.abandon_with_message(message);
    }
}

pub fn status_line(completed: usize, total: usize, elapsed: Duration) -> String {
    let percent = if total == 0 { 100.0 } else { completed as f64 / total as f64 * 100.0 };
    format!(
        "{completed} of {total} files downloaded ({percent:.2}%). ETA of roughly {eta} more minutes",
        eta = eta_minutes(completed, total, elapsed),
    )
}

/// Remaining whole minutes, extrapolated from the average time per completed task.
pub fn eta_minutes(completed: usize, total: usize, elapsed: Duration) -> u64 {
    if completed == 0 {
        return 0;
    }
    let remaining = total.saturating_sub(completed) as f64;
    (elapsed.as_secs_f64() / completed as f64 * remaining / 60.0) as u64
}
