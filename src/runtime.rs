// src/runtime.rs

//! Wiring from configuration to runnable jobs.
//!
//! Shared by the CLI and the Lambda handler, which differ only in the
//! storage backend they pass in.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::{BusNoticePipeline, DetourPipeline, Job, Scheduler, SchoolNoticePipeline};
use crate::services::alert::{self, Alert};
use crate::services::{
    AlertSink, BusArrivalClient, BusNoticeCrawler, DetourNotifier, HttpNotifier, LogAlerter,
    LogNotifier, SchoolNoticeCrawler, SlackAlerter, TextRecognizer, VisionRecognizer,
};
use crate::storage::{DocumentStore, HistoryStore};
use crate::utils::http::create_async_client;

/// The schedulable jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Detour,
    BusNotice,
    SchoolNotice,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Detour, JobKind::BusNotice, JobKind::SchoolNotice];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Detour => "detour",
            JobKind::BusNotice => "bus_notice",
            JobKind::SchoolNotice => "school_notice",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| AppError::config(format!("unknown job: {s}")))
    }
}

/// All jobs, built once from a validated configuration.
pub struct Jobs {
    pub detour: Arc<DetourPipeline>,
    pub bus_notice: Arc<BusNoticePipeline>,
    pub school_notice: Arc<SchoolNoticePipeline>,
    pub alerts: Arc<dyn AlertSink>,
    alert_host: String,
}

impl Jobs {
    /// Build every job against `storage`.
    pub fn build<S>(config: &Config, storage: Arc<S>) -> Result<Self>
    where
        S: HistoryStore + DocumentStore + 'static,
    {
        let client = create_async_client(&config.crawler)?;

        let alerts: Arc<dyn AlertSink> = if config.alert.enabled {
            Arc::new(SlackAlerter::new(client.clone(), &config.alert))
        } else {
            log::info!("Alerts disabled, failures are only logged");
            Arc::new(LogAlerter)
        };

        let notifier: Arc<dyn DetourNotifier> = if config.notifier.enabled {
            Arc::new(HttpNotifier::new(client.clone(), &config.notifier))
        } else {
            log::info!("Notifier disabled, transitions are only logged");
            Arc::new(LogNotifier)
        };

        let recognizer: Option<Arc<dyn TextRecognizer>> = if config.ocr.enabled {
            Some(Arc::new(VisionRecognizer::new(client.clone(), &config.ocr)))
        } else {
            None
        };

        let detour = DetourPipeline::new(
            config,
            Arc::new(BusArrivalClient::new(client.clone(), &config.bus)),
            notifier,
            storage.clone(),
            storage.clone(),
            alerts.clone(),
        );

        let bus_notice = BusNoticePipeline::new(
            config,
            Arc::new(
                BusNoticeCrawler::new(client.clone(), &config.notices)
                    .with_download_retries(config.ocr.download_retries),
            ),
            recognizer,
            storage.clone(),
            alerts.clone(),
        );

        let school_notice = SchoolNoticePipeline::new(
            config,
            Arc::new(SchoolNoticeCrawler::new(client, &config.notices)),
            storage,
        );

        Ok(Self {
            detour: Arc::new(detour),
            bus_notice: Arc::new(bus_notice),
            school_notice: Arc::new(school_notice),
            alerts,
            alert_host: config.alert.host.clone(),
        })
    }

    pub fn job(&self, kind: JobKind) -> Arc<dyn Job> {
        match kind {
            JobKind::Detour => self.detour.clone(),
            JobKind::BusNotice => self.bus_notice.clone(),
            JobKind::SchoolNotice => self.school_notice.clone(),
        }
    }

    /// Run one job once, alerting on failure.
    pub async fn run_once(&self, kind: JobKind) -> Result<()> {
        let job = self.job(kind);
        match job.run_once().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let alert = Alert::cycle_failure(&self.alert_host, kind.as_str(), &e);
                alert::send_or_log(self.alerts.as_ref(), &alert).await;
                Err(e)
            }
        }
    }

    /// Scheduler running every job on its configured interval.
    pub fn scheduler(&self, config: &Config) -> Scheduler {
        let schedule = &config.schedule;
        Scheduler::new(self.alerts.clone(), &self.alert_host)
            .add(self.job(JobKind::Detour), Duration::from_secs(schedule.detour_interval_secs))
            .add(
                self.job(JobKind::BusNotice),
                Duration::from_secs(schedule.bus_notice_interval_secs),
            )
            .add(
                self.job(JobKind::SchoolNotice),
                Duration::from_secs(schedule.school_notice_interval_secs),
            )
    }
}
