// src/pipeline/schedule.rs

//! Periodic job runner.
//!
//! Each job runs once at startup and then on its own interval. A job never
//! overlaps itself: ticks missed while a cycle is still running are
//! skipped. Dropping the scheduler future (shutdown) drops any in-flight
//! cycle with it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::services::alert::{self, Alert, AlertSink};

use super::detour::DetourPipeline;
use super::notices::{BusNoticePipeline, SchoolNoticePipeline};

/// A unit of scheduled work.
#[async_trait]
pub trait Job: Send + Sync {
    /// Short name used in logs and alerts.
    fn name(&self) -> &str;

    /// Run one complete cycle.
    async fn run_once(&self) -> Result<()>;
}

#[async_trait]
impl Job for DetourPipeline {
    fn name(&self) -> &str {
        "detour"
    }

    async fn run_once(&self) -> Result<()> {
        self.run_cycle().await.map(|_| ())
    }
}

#[async_trait]
impl Job for BusNoticePipeline {
    fn name(&self) -> &str {
        "bus_notice"
    }

    async fn run_once(&self) -> Result<()> {
        self.run_cycle().await.map(|_| ())
    }
}

#[async_trait]
impl Job for SchoolNoticePipeline {
    fn name(&self) -> &str {
        "school_notice"
    }

    async fn run_once(&self) -> Result<()> {
        self.run_cycle().await.map(|_| ())
    }
}

/// Run a job once, reporting a failure through the alert sink.
///
/// Returns whether the cycle succeeded.
pub async fn run_reporting(job: &dyn Job, alerts: &dyn AlertSink, host: &str) -> bool {
    match job.run_once().await {
        Ok(()) => true,
        Err(e) => {
            log::error!("Job {} failed: {}", job.name(), e);
            alert::send_or_log(alerts, &Alert::cycle_failure(host, job.name(), &e)).await;
            false
        }
    }
}

/// Runs registered jobs on fixed intervals.
pub struct Scheduler {
    alerts: Arc<dyn AlertSink>,
    host: String,
    jobs: Vec<(Arc<dyn Job>, Duration)>,
}

impl Scheduler {
    pub fn new(alerts: Arc<dyn AlertSink>, host: impl Into<String>) -> Self {
        Self {
            alerts,
            host: host.into(),
            jobs: Vec::new(),
        }
    }

    /// Register `job` to run every `period`.
    pub fn add(mut self, job: Arc<dyn Job>, period: Duration) -> Self {
        self.jobs.push((job, period));
        self
    }

    /// Run every job until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        log::info!("Scheduler starting {} jobs", self.jobs.len());

        let loops = self
            .jobs
            .iter()
            .map(|(job, period)| self.run_every(job.as_ref(), *period));

        tokio::select! {
            _ = futures::future::join_all(loops) => {}
            _ = shutdown => log::info!("Shutdown requested, stopping scheduler"),
        }
    }

    async fn run_every(&self, job: &dyn Job, period: Duration) {
        log::info!("Scheduling {} every {}s", job.name(), period.as_secs());
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // First tick completes immediately.
            interval.tick().await;
            run_reporting(job, self.alerts.as_ref(), &self.host).await;
        }
    }
}
