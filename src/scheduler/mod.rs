//! Cron-driven background jobs.
//!
//! A [`Scheduler`] is built from a list of [`ScheduledTask`]s and started and
//! stopped as a unit. Every run executes on its own task so a failing or
//! panicking job is logged and the schedule carries on.

mod jobs;

pub use jobs::{default_jobs, feed_check_cron, is_last_day_of_month, JobContext};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
    #[error("Invalid schedule '{cron}' for job {name}: {source}")]
    InvalidSchedule {
        name: String,
        cron: String,
        source: JobSchedulerError,
    },
}

/// A named job and the six-field (seconds first, UTC) cron expression it
/// runs on.
#[derive(Clone)]
pub struct ScheduledTask {
    pub name: String,
    pub cron: String,
    run: TaskFn,
}

impl ScheduledTask {
    pub fn new<F, Fut>(name: impl Into<String>, cron: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            cron: cron.into(),
            run: Arc::new(move || -> TaskFuture { Box::pin(run()) }),
        }
    }

    /// Run once inside the error boundary. Returns whether the run succeeded.
    pub async fn run_guarded(&self) -> bool {
        let started = std::time::Instant::now();
        match tokio::spawn((self.run)()).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    job = %self.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scheduled job finished"
                );
                true
            }
            Ok(Err(e)) => {
                tracing::error!(job = %self.name, error = %e, "Scheduled job failed");
                false
            }
            Err(e) => {
                tracing::error!(job = %self.name, error = %e, "Scheduled job panicked");
                false
            }
        }
    }
}

/// Owns the cron runtime and the registered jobs.
pub struct Scheduler {
    inner: JobScheduler,
    names: Vec<String>,
}

impl Scheduler {
    /// Register every task. Fails on the first invalid cron expression.
    pub async fn new(tasks: Vec<ScheduledTask>) -> Result<Self, SchedulerError> {
        let inner = JobScheduler::new().await?;
        let mut names = Vec::with_capacity(tasks.len());

        for task in tasks {
            let name = task.name.clone();
            let cron = task.cron.clone();
            let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
                let task = task.clone();
                Box::pin(async move {
                    task.run_guarded().await;
                })
            })
            .map_err(|source| SchedulerError::InvalidSchedule {
                name: name.clone(),
                cron: cron.clone(),
                source,
            })?;
            inner.add(job).await?;
            tracing::debug!(job = %name, cron = %cron, "Registered scheduled job");
            names.push(name);
        }

        Ok(Self { inner, names })
    }

    pub fn job_names(&self) -> &[String] {
        &self.names
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.inner.start().await?;
        tracing::info!(jobs = self.names.len(), "Scheduler started");
        Ok(())
    }

    /// Stop future firings. Runs already in flight are not awaited.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}
