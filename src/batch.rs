use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

use crate::config::Config;
use crate::error::Error;
use crate::model::Outcome;
use crate::progress::Progress;
use crate::service::Worker;

/// Totals of a drained batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub total: usize,
    pub saved: usize,
    pub missing: usize,
    pub bytes: u64,
}

/// Runs a worker over a list of dates with at most `limit` of them in flight.
///
/// Dates are admitted in order; each needs a permit from the gate before its
/// task is spawned, so the dispatch loop itself waits while the gate is full.
/// A missing raster is reported and counted as done. Any other error ends the
/// run at once: the remaining tasks are aborted and the error is returned.
pub struct Batch<W: Worker> {
    worker: Arc<W>,
    gate: Arc<Semaphore>,
    quiet: bool,
}

impl<W: Worker> Batch<W> {
    pub fn new(worker: W, limit: NonZeroUsize, quiet: bool) -> Self {
        let permits = limit.get().min(Semaphore::MAX_PERMITS);
        Batch { worker: Arc::new(worker), gate: Arc::new(Semaphore::new(permits)), quiet }
    }

    /// Single dates run without a progress display.
    pub fn from_config(worker: W, config: &Config) -> Self {
        let quiet = config.quiet || !config.selection.is_range();
        Self::new(worker, config.concurrency_limit, quiet)
    }

    pub async fn run(&self, dates: Vec<NaiveDate>) -> Result<Report, Error> {
        let progress = Arc::new(Progress::new(dates.len(), self.quiet));
        let mut report = Report { total: dates.len(), ..Report::default() };
        let mut tasks: JoinSet<Result<(NaiveDate, Outcome), Error>> = JoinSet::new();
        let mut pending = dates.into_iter();
        let mut next = pending.next();

        while let Some(date) = next {
            tokio::select! {
                biased;
                Some(joined) = tasks.join_next() => {
                    if let Err(e) = settle(joined, &mut report, &progress) {
                        progress.abandon(format!("Aborted: {e}"));
                        return Err(e);
                    }
                }
                permit = Arc::clone(&self.gate).acquire_owned() => {
                    let permit = permit?;
                    let worker = Arc::clone(&self.worker);
                    let progress = Arc::clone(&progress);
                    tasks.spawn(async move {
                        let _permit = permit;
                        let outcome = worker.process(date).await?;
                        progress.record();
                        Ok((date, outcome))
                    });
                    next = pending.next();
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = settle(joined, &mut report, &progress) {
                progress.abandon(format!("Aborted: {e}"));
                return Err(e);
            }
        }

        progress.finish(format!(
            "{saved} of {total} files downloaded, {missing} without data",
            saved = report.saved,
            total = report.total,
            missing = report.missing,
        ));
        Ok(report)
    }
}

fn settle(
    joined: Result<Result<(NaiveDate, Outcome), Error>, JoinError>,
    report: &mut Report,
    progress: &Progress,
) -> Result<(), Error> {
    match joined?? {
        (date, Outcome::Saved { bytes }) => {
            debug!(%date, bytes, "Downloaded");
            report.saved += 1;
            report.bytes += bytes;
        }
        (date, Outcome::Missing) => {
            progress.notice(&missing_notice(date));
            report.missing += 1;
        }
    }
    Ok(())
}

fn missing_notice(date: NaiveDate) -> String {
    format!("No data for {date}")
}
