use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Ticker definition for one recurring job. The scheduler only sends
/// ticks; the receiving worker loop owns the work and its errors.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub interval: Duration,
    /// Fire the first tick right away instead of one interval from now.
    pub run_immediately: bool,
    pub tick: mpsc::Sender<()>,
}

/// Spawn one ticker task per job and return their handles.
pub fn start(jobs: Vec<JobSpec>) -> Vec<JoinHandle<()>> {
    jobs.into_iter()
        .map(|job| tokio::spawn(run_ticker(job)))
        .collect()
}

/// A lagging worker never accumulates a backlog: missed ticks are
/// skipped and the next one lands back on the original schedule.
async fn run_ticker(job: JobSpec) {
    let first = if job.run_immediately {
        Instant::now()
    } else {
        Instant::now() + job.interval
    };
    let mut ticks = tokio::time::interval_at(first, job.interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticks.tick().await;
        tracing::debug!(job = %job.name, "scheduler tick");
        // A closed receiver means the worker loop is gone; stop ticking.
        if job.tick.send(()).await.is_err() {
            break;
        }
    }
}
