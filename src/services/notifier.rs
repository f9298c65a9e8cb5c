// src/services/notifier.rs

//! Detour notifications.
//!
//! Each transition maps to one call on the notification service:
//! `detourStart`, `detourUpdate` or `detourFinish`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{NotifierConfig, Route};
use crate::pipeline::Transition;

/// Outbound detour notifications. Each call is one request.
#[async_trait]
pub trait DetourNotifier: Send + Sync {
    async fn detour_start(&self, route: &Route) -> Result<()>;
    async fn detour_update(&self, route: &Route) -> Result<()>;
    async fn detour_finish(&self, route: &Route) -> Result<()>;
}

/// Send the notification matching `transition`.
///
/// Returns `None` when the transition needs no notification.
pub async fn dispatch(
    notifier: &dyn DetourNotifier,
    transition: Transition,
    route: &Route,
) -> Option<Result<()>> {
    let result = match transition {
        Transition::None => return None,
        Transition::Started => notifier.detour_start(route).await,
        Transition::Updated => notifier.detour_update(route).await,
        Transition::Ended => notifier.detour_finish(route).await,
    };
    Some(result)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotifyRequest<'a> {
    key: &'a str,
    bus_name: &'a str,
    kind: &'a str,
}

/// HTTP notifier posting JSON to `{base_url}/{operation}`.
pub struct HttpNotifier {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl HttpNotifier {
    pub fn new(client: Client, config: &NotifierConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        }
    }

    async fn call(&self, operation: &str, route: &Route) -> Result<()> {
        let url = format!("{}/{}", self.base_url, operation);
        let body = NotifyRequest {
            key: &self.secret_key,
            bus_name: &route.display_name,
            kind: &route.notification_kind,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::notify(&route.display_name, format!("{operation}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::notify(
                &route.display_name,
                format!("{operation}: HTTP {status}"),
            ));
        }

        log::info!("Notified {} for route {}", operation, route.display_name);
        Ok(())
    }
}

#[async_trait]
impl DetourNotifier for HttpNotifier {
    async fn detour_start(&self, route: &Route) -> Result<()> {
        self.call("detourStart", route).await
    }

    async fn detour_update(&self, route: &Route) -> Result<()> {
        self.call("detourUpdate", route).await
    }

    async fn detour_finish(&self, route: &Route) -> Result<()> {
        self.call("detourFinish", route).await
    }
}

/// Notifier used when no endpoint is configured: logs and succeeds.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl DetourNotifier for LogNotifier {
    async fn detour_start(&self, route: &Route) -> Result<()> {
        log::info!("[notify disabled] detourStart {} ({})", route.display_name, route.notification_kind);
        Ok(())
    }

    async fn detour_update(&self, route: &Route) -> Result<()> {
        log::info!("[notify disabled] detourUpdate {} ({})", route.display_name, route.notification_kind);
        Ok(())
    }

    async fn detour_finish(&self, route: &Route) -> Result<()> {
        log::info!("[notify disabled] detourFinish {} ({})", route.display_name, route.notification_kind);
        Ok(())
    }
}
