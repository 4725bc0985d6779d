//! Periodic jobs on tokio intervals.
//!
//! Each job gets its own task. The first run happens immediately; a run that
//! overlaps the next tick delays it, and missed ticks are skipped rather than bursted.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Job {
    name: String,
    period: Duration,
    run: Arc<dyn Fn() -> JobFuture + Send + Sync>,
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<Job>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` to run every `period`.
    pub fn every<F, Fut>(mut self, name: &str, period: Duration, job: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.jobs.push(Job {
            name: name.to_string(),
            period,
            run: Arc::new(move || -> JobFuture { Box::pin(job()) }),
        });
        self
    }

    /// Spawn every registered job. Abort the handles to stop them.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        self.jobs
            .into_iter()
            .map(|job| tokio::spawn(run_job(job)))
            .collect()
    }
}

async fn run_job(job: Job) {
    let mut interval = tokio::time::interval(job.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(job = %job.name, period_secs = job.period.as_secs(), "job scheduled");
    loop {
        interval.tick().await;
        debug!(job = %job.name, "job tick");
        (job.run)().await;
    }
}
