// src/lambda/mod.rs

//! AWS Lambda handler for the crawler.
//!
//! Each invocation runs one cycle of one job against S3 storage:
//!
//! ```json
//! { "job": "detour" }
//! ```
//!
//! Configuration is read from `{prefix}/config.toml` when present, with
//! secrets taken from the environment. Failures before the jobs exist
//! (S3 client, config load, validation) are alerted through a Slack sink
//! built from the environment secrets alone.

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::{AppError, Result};
use crate::models::{AlertConfig, Config, CrawlerConfig};
use crate::runtime::{JobKind, Jobs};
use crate::services::alert::{self, Alert, AlertSink, LogAlerter, SlackAlerter};
use crate::storage::s3::S3Storage;
use crate::utils::http::create_async_client;

/// Lambda invocation payload.
#[derive(Debug, Deserialize)]
pub struct JobRequest {
    /// Job to run; defaults to the detour poll
    #[serde(default = "default_job")]
    pub job: JobKind,
}

fn default_job() -> JobKind {
    JobKind::Detour
}

/// Lambda response payload.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job: JobKind,

    /// Whether the cycle completed
    pub success: bool,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(event: LambdaEvent<JobRequest>) -> std::result::Result<JobResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();
    info!("Starting job: {}", request.job);

    let result = run_job(request.job).await;
    let execution_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => {
            info!("Job {} completed in {}ms", request.job, execution_time_ms);
            Ok(JobResponse {
                job: request.job,
                success: true,
                error: None,
                execution_time_ms,
            })
        }
        Err(e) => {
            error!("Job {} failed: {}", request.job, e);
            Ok(JobResponse {
                job: request.job,
                success: false,
                error: Some(e.to_string()),
                execution_time_ms,
            })
        }
    }
}

async fn run_job(kind: JobKind) -> Result<()> {
    let jobs = match prepare_jobs().await {
        Ok(jobs) => jobs,
        Err(e) => {
            let failure = Alert::cycle_failure(AlertConfig::default().host, kind.as_str(), &e);
            alert::send_or_log(fallback_alerter().as_ref(), &failure).await;
            return Err(e);
        }
    };

    jobs.run_once(kind).await
}

async fn prepare_jobs() -> Result<Jobs> {
    let storage = Arc::new(S3Storage::from_env().await?);
    let config = load_lambda_config(&storage).await?;
    config.validate()?;

    Jobs::build(&config, storage)
}

/// Alert settings from the environment alone, if both Slack secrets are set.
fn fallback_alert_config(lookup: impl Fn(&str) -> Option<String>) -> Option<AlertConfig> {
    let mut config = Config::default();
    config.apply_env_with(lookup);

    let mut alert = config.alert;
    if alert.bot_token.is_empty() || alert.channel.is_empty() {
        return None;
    }
    alert.enabled = true;
    Some(alert)
}

fn fallback_alerter() -> Arc<dyn AlertSink> {
    let Some(config) = fallback_alert_config(|key| std::env::var(key).ok()) else {
        error!("SLACK_BOT_TOKEN or SLACK_ERROR_CHANNEL unset, setup failure is only logged");
        return Arc::new(LogAlerter);
    };

    match create_async_client(&CrawlerConfig::default()) {
        Ok(client) => Arc::new(SlackAlerter::new(client, &config)),
        Err(e) => {
            error!("Failed to build alert client: {}", e);
            Arc::new(LogAlerter)
        }
    }
}

/// Load `config.toml` from S3, falling back to defaults.
async fn load_lambda_config(storage: &S3Storage) -> Result<Config> {
    let key = storage.config_key();
    let mut config = match storage.read_bytes_optional(&key).await? {
        Some(bytes) => {
            let text = String::from_utf8(bytes)
                .map_err(|e| AppError::config(format!("{key} is not UTF-8: {e}")))?;
            toml::from_str(&text)?
        }
        None => {
            info!("No config at {}, using defaults", key);
            Config::default()
        }
    };

    if let Some(delay) = std::env::var("REQUEST_DELAY_MS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.crawler.request_delay_ms = delay;
    }
    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_request_defaults_to_detour() {
        let req: JobRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.job, JobKind::Detour);
    }

    #[test]
    fn test_job_request_names() {
        let req: JobRequest = serde_json::from_str(r#"{"job": "bus_notice"}"#).unwrap();
        assert_eq!(req.job, JobKind::BusNotice);
        assert!(serde_json::from_str::<JobRequest>(r#"{"job": "map"}"#).is_err());
    }

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_fallback_alerts_need_both_secrets() {

        assert!(fallback_alert_config(env(&[])).is_none());
        assert!(fallback_alert_config(env(&[("SLACK_BOT_TOKEN", "xoxb-1")])).is_none());
        assert!(
            fallback_alert_config(env(&[("SLACK_BOT_TOKEN", "xoxb-1"), ("SLACK_ERROR_CHANNEL", "  ")]))
                .is_none()
        );

        let config = fallback_alert_config(env(&[
            ("SLACK_BOT_TOKEN", "xoxb-1"),
            ("SLACK_ERROR_CHANNEL", "C0123"),
        ]))
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.bot_token, "xoxb-1");
        assert_eq!(config.channel, "C0123");
        assert_eq!(config.host, AlertConfig::default().host);
    }

    #[test]
    fn test_response_shape() {
        let response = JobResponse {
            job: JobKind::SchoolNotice,
            success: false,
            error: Some("boom".into()),
            execution_time_ms: 12,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["job"], "school_notice");
        assert_eq!(value["error"], "boom");
    }
}
