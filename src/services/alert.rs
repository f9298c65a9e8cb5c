// src/services/alert.rs

//! Failure channel.
//!
//! Alerts are structured JSON messages posted to a Slack channel:
//!
//! ```json
//! {
//!   "Level": "error",
//!   "ErrorHost": "BUS Crawling",
//!   "Time": "2026-10-19T13:00:32.447+09:00",
//!   "WarningMessage": "detour cycle failed",
//!   "data": { "error": "..." }
//! }
//! ```

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Asia::Seoul;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::AlertConfig;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Error,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Warning => f.write_str("warning"),
            AlertLevel::Error => f.write_str("error"),
        }
    }
}

/// A structured alert message.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    #[serde(rename = "Level")]
    pub level: AlertLevel,

    #[serde(rename = "ErrorHost")]
    pub host: String,

    /// RFC 3339 timestamp in Asia/Seoul
    #[serde(rename = "Time")]
    pub time: String,

    #[serde(rename = "WarningMessage")]
    pub summary: String,

    pub data: Value,
}

impl Alert {
    pub fn new(level: AlertLevel, host: impl Into<String>, summary: impl Into<String>, data: Value) -> Self {
        Self {
            level,
            host: host.into(),
            time: Utc::now().with_timezone(&Seoul).to_rfc3339(),
            summary: summary.into(),
            data,
        }
    }

    pub fn error(host: impl Into<String>, summary: impl Into<String>, data: Value) -> Self {
        Self::new(AlertLevel::Error, host, summary, data)
    }

    pub fn warning(host: impl Into<String>, summary: impl Into<String>, data: Value) -> Self {
        Self::new(AlertLevel::Warning, host, summary, data)
    }

    /// Alert for a cycle that failed as a whole.
    pub fn cycle_failure(host: impl Into<String>, job: &str, error: &AppError) -> Self {
        Self::error(
            host,
            format!("Unexpected error: the {job} cycle failed and will be retried on the next schedule."),
            json!({ "job": job, "error": error.to_string() }),
        )
    }

    /// Message text sent to the channel.
    pub fn to_message(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.summary.clone())
    }
}

/// Destination for alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Send an alert, logging instead of failing if delivery breaks.
pub async fn send_or_log(sink: &dyn AlertSink, alert: &Alert) {
    if let Err(e) = sink.send(alert).await {
        log::error!("Alert delivery failed ({}): {}", e, alert.summary);
    }
}

/// Slack `chat.postMessage` sink.
pub struct SlackAlerter {
    client: Client,
    api_url: String,
    bot_token: String,
    channel: String,
}

impl SlackAlerter {
    pub fn new(client: Client, config: &AlertConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            bot_token: config.bot_token.clone(),
            channel: config.channel.clone(),
        }
    }
}

#[async_trait]
impl AlertSink for SlackAlerter {
    async fn send(&self, alert: &Alert) -> Result<()> {
        log::warn!("Sending {} alert: {}", alert.level, alert.summary);

        let response: Value = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.bot_token)
            .json(&json!({ "channel": self.channel, "text": alert.to_message() }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Slack reports failures with HTTP 200 and `ok: false`.
        if response.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = response
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(AppError::upstream("slack", reason));
        }
        Ok(())
    }
}

/// Sink used when alerts are disabled: writes the alert to the log.
#[derive(Debug, Default)]
pub struct LogAlerter;

#[async_trait]
impl AlertSink for LogAlerter {
    async fn send(&self, alert: &Alert) -> Result<()> {
        match alert.level {
            AlertLevel::Error => log::error!("ALERT {}", alert.to_message()),
            AlertLevel::Warning => log::warn!("ALERT {}", alert.to_message()),
        }
        Ok(())
    }
}
