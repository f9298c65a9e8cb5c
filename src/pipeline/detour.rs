// src/pipeline/detour.rs

//! Detour poll cycle.
//!
//! One cycle reads the stored history once, walks the configured routes in
//! order, and finishes with exactly two writes: the new history, then the
//! `bus_route` collection. A route whose fetch fails keeps its previous
//! history entry, is not notified, and is left out of the collection.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::Result;
use crate::models::{Config, Route};
use crate::services::alert::{self, Alert, AlertSink};
use crate::services::arrivals::{self, RouteStatusSource};
use crate::services::notifier::{self, DetourNotifier};
use crate::storage::{DocumentStore, History, HistoryStore, collections};

use super::classify::{Transition, classify};

/// Per-route result of a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RouteOutcome {
    pub route: String,
    #[serde(flatten)]
    pub status: RouteStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteStatus {
    Observed {
        transition: Transition,
        detoured_stops: usize,
        observed_at: DateTime<Utc>,
        /// Set when the notification for `transition` failed
        #[serde(skip_serializing_if = "Option::is_none")]
        notify_error: Option<String>,
    },
    FetchFailed {
        error: String,
        /// Whether a previous history entry was kept
        carried_forward: bool,
    },
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub routes: Vec<RouteOutcome>,
    /// Entries in the history written by this cycle
    pub active_detours: usize,
}

impl CycleReport {
    /// Routes whose transition needed a notification.
    pub fn changes(&self) -> impl Iterator<Item = (&str, Transition)> {
        self.routes.iter().filter_map(|o| match &o.status {
            RouteStatus::Observed { transition, .. } if transition.is_change() => {
                Some((o.route.as_str(), *transition))
            }
            _ => None,
        })
    }

    pub fn fetch_failures(&self) -> usize {
        self.routes
            .iter()
            .filter(|o| matches!(o.status, RouteStatus::FetchFailed { .. }))
            .count()
    }

    pub fn notify_failures(&self) -> usize {
        self.routes
            .iter()
            .filter(|o| {
                matches!(
                    o.status,
                    RouteStatus::Observed {
                        notify_error: Some(_),
                        ..
                    }
                )
            })
            .count()
    }
}

/// Detour polling pipeline.
pub struct DetourPipeline {
    routes: Vec<Route>,
    request_delay: Duration,
    alert_host: String,
    source: Arc<dyn RouteStatusSource>,
    notifier: Arc<dyn DetourNotifier>,
    history: Arc<dyn HistoryStore>,
    documents: Arc<dyn DocumentStore>,
    alerts: Arc<dyn AlertSink>,
}

impl DetourPipeline {
    pub fn new(
        config: &Config,
        source: Arc<dyn RouteStatusSource>,
        notifier: Arc<dyn DetourNotifier>,
        history: Arc<dyn HistoryStore>,
        documents: Arc<dyn DocumentStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            routes: config.bus.routes.clone(),
            request_delay: Duration::from_millis(config.crawler.request_delay_ms),
            alert_host: config.alert.host.clone(),
            source,
            notifier,
            history,
            documents,
            alerts,
        }
    }

    /// Run one poll cycle.
    ///
    /// Fails only when the history cannot be read or either final write
    /// fails. A failed history read leaves every store untouched.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started_at = Utc::now();
        let previous = self.history.load_history().await?;
        log::info!(
            "Detour cycle: {} routes, {} active detours stored",
            self.routes.len(),
            previous.len()
        );

        let mut next = History::new();
        let mut batch = Vec::with_capacity(self.routes.len());
        let mut outcomes = Vec::with_capacity(self.routes.len());

        for (index, route) in self.routes.iter().enumerate() {
            if index > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            let stored = previous.get(&route.display_name);
            let snapshot = match arrivals::fetch_snapshot(self.source.as_ref(), route).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    let carried_forward = match stored {
                        Some(fp) => {
                            next.insert(route.display_name.clone(), fp.clone());
                            true
                        }
                        None => false,
                    };
                    log::warn!(
                        "  ✗ {} fetch failed, keeping previous state: {}",
                        route.display_name,
                        e
                    );
                    outcomes.push(RouteOutcome {
                        route: route.display_name.clone(),
                        status: RouteStatus::FetchFailed {
                            error: e.to_string(),
                            carried_forward,
                        },
                    });
                    continue;
                }
            };

            let transition = classify(stored, snapshot.detoured_stops());
            if transition.is_change() {
                log::info!(
                    "  → {} detour {} ({} stops)",
                    route.display_name,
                    transition,
                    snapshot.detoured_stops().len()
                );
            } else {
                log::debug!("  {} unchanged", route.display_name);
            }

            let dispatched =
                notifier::dispatch(self.notifier.as_ref(), transition, snapshot.route()).await;
            let notify_error = match dispatched {
                Some(Err(e)) => {
                    log::warn!("  ✗ {} notification failed: {}", route.display_name, e);
                    let alert = Alert::warning(
                        &self.alert_host,
                        format!("{} detour {} notification failed", route.display_name, transition),
                        json!({ "route": route.display_name, "transition": transition, "error": e.to_string() }),
                    );
                    alert::send_or_log(self.alerts.as_ref(), &alert).await;
                    Some(e.to_string())
                }
                _ => None,
            };

            if let Some(fp) = snapshot.fingerprint() {
                next.insert(route.display_name.clone(), fp.clone());
            }
            batch.push(serde_json::to_value(snapshot.to_document())?);
            outcomes.push(RouteOutcome {
                route: route.display_name.clone(),
                status: RouteStatus::Observed {
                    transition,
                    detoured_stops: snapshot.detoured_stops().len(),
                    observed_at: snapshot.observed_at(),
                    notify_error,
                },
            });
        }

        self.history.replace_history(&next).await?;
        let meta = self
            .documents
            .replace_collection(collections::BUS_ROUTE, batch)
            .await?;

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            routes: outcomes,
            active_detours: next.len(),
        };
        log::info!(
            "Detour cycle done: {} active, {} changed, {} fetch failures, {} routes saved to {}",
            report.active_detours,
            report.changes().count(),
            report.fetch_failures(),
            meta.count,
            meta.location
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{BusConfig, CrawlerConfig, Fingerprint, StopRecord};
    use crate::pipeline::fingerprint;
    use crate::pipeline::testing::{
        FakeSource, MemoryDocuments, MemoryHistory, RecordingAlerts, RecordingNotifier,
    };

    struct Harness {
        source: Arc<FakeSource>,
        notifier: Arc<RecordingNotifier>,
        history: Arc<MemoryHistory>,
        documents: Arc<MemoryDocuments>,
        alerts: Arc<RecordingAlerts>,
        pipeline: DetourPipeline,
    }

    fn harness(routes: &[&str]) -> Harness {
        let config = Config {
            crawler: CrawlerConfig {
                request_delay_ms: 0,
                ..Default::default()
            },
            bus: BusConfig {
                routes: routes
                    .iter()
                    .map(|name| Route::new(format!("id-{name}"), *name, format!("kind{name}")))
                    .collect(),
                ..Default::default()
            },
            ..Default::default()
        };

        let source = Arc::new(FakeSource::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let history = Arc::new(MemoryHistory::default());
        let documents = Arc::new(MemoryDocuments::default());
        let alerts = Arc::new(RecordingAlerts::default());
        let pipeline = DetourPipeline::new(
            &config,
            source.clone(),
            notifier.clone(),
            history.clone(),
            documents.clone(),
            alerts.clone(),
        );

        Harness {
            source,
            notifier,
            history,
            documents,
            alerts,
            pipeline,
        }
    }

    fn stops(ids: &[&str]) -> Vec<StopRecord> {
        ids.iter()
            .map(|id| StopRecord::new(format!("정류장{id}"), *id))
            .collect()
    }

    fn seed(h: &Harness, name: &str, fp: Fingerprint) {
        h.history.state.lock().unwrap().insert(name.to_string(), fp);
    }

    #[tokio::test]
    async fn test_two_cycle_scenario() {
        let h = harness(&["A", "B"]);
        let a_stops = stops(&["1", "2"]);

        // Cycle 1: A detoured, B normal.
        h.source.set("id-A", a_stops.clone());
        h.source.set("id-B", Vec::new());
        h.pipeline.run_cycle().await.unwrap();

        assert_eq!(h.notifier.calls(), vec![("start", "A".to_string())]);
        let history = h.history.snapshot();
        assert_eq!(history.len(), 1);
        assert_eq!(history["A"], fingerprint(&a_stops));

        // Cycle 2: A back to normal, B detoured.
        h.notifier.clear();
        let b_stops = stops(&["9"]);
        h.source.set("id-A", Vec::new());
        h.source.set("id-B", b_stops.clone());
        h.pipeline.run_cycle().await.unwrap();

        assert_eq!(
            h.notifier.calls(),
            vec![("finish", "A".to_string()), ("start", "B".to_string())]
        );
        let history = h.history.snapshot();
        assert_eq!(history.len(), 1);
        assert_eq!(history["B"], fingerprint(&b_stops));
    }

    #[tokio::test]
    async fn test_transitions_for_each_history_case() {
        let h = harness(&["new", "same", "changed", "ended", "quiet"]);
        let same = stops(&["1"]);
        seed(&h, "same", fingerprint(&same));
        seed(&h, "changed", fingerprint(&stops(&["1"])));
        seed(&h, "ended", fingerprint(&stops(&["5"])));

        h.source.set("id-new", stops(&["3"]));
        h.source.set("id-same", same);
        h.source.set("id-changed", stops(&["1", "2"]));
        h.source.set("id-ended", Vec::new());
        h.source.set("id-quiet", Vec::new());

        let report = h.pipeline.run_cycle().await.unwrap();
        let changes: Vec<_> = report.changes().collect();
        assert_eq!(
            changes,
            vec![
                ("new", Transition::Started),
                ("changed", Transition::Updated),
                ("ended", Transition::Ended),
            ]
        );
        assert_eq!(
            h.notifier.calls(),
            vec![
                ("start", "new".to_string()),
                ("update", "changed".to_string()),
                ("finish", "ended".to_string()),
            ]
        );

        let history = h.history.snapshot();
        assert_eq!(
            history.keys().collect::<Vec<_>>(),
            vec!["changed", "new", "same"]
        );
    }

    #[tokio::test]
    async fn test_at_most_one_notification_per_route() {
        let h = harness(&["A", "B", "C"]);
        h.source.set("id-A", stops(&["1", "2", "3", "4"]));
        h.source.set("id-B", stops(&["5"]));
        h.source.set("id-C", stops(&["6", "7"]));

        h.pipeline.run_cycle().await.unwrap();

        let calls = h.notifier.calls();
        assert_eq!(calls.len(), 3);
        for name in ["A", "B", "C"] {
            assert_eq!(calls.iter().filter(|(_, n)| n == name).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_forward() {
        let h = harness(&["A", "B", "C"]);
        let b_old = fingerprint(&stops(&["8"]));
        seed(&h, "B", b_old.clone());

        h.source.set("id-A", stops(&["1"]));
        h.source.fail("id-B", "connection reset");
        h.source.set("id-C", stops(&["2"]));

        let report = h.pipeline.run_cycle().await.unwrap();

        // Other routes still processed and notified.
        assert_eq!(
            h.notifier.calls(),
            vec![("start", "A".to_string()), ("start", "C".to_string())]
        );
        assert_eq!(report.fetch_failures(), 1);
        assert!(matches!(
            report.routes[1].status,
            RouteStatus::FetchFailed {
                carried_forward: true,
                ..
            }
        ));

        let history = h.history.snapshot();
        assert_eq!(history["B"], b_old);
        assert_eq!(history.len(), 3);

        // Failed route is not part of the collection.
        let docs = h.documents.get(collections::BUS_ROUTE).unwrap();
        let names: Vec<_> = docs.iter().map(|d| d["busName"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_without_history_adds_nothing() {
        let h = harness(&["A"]);
        h.source.fail("id-A", "timeout");

        let report = h.pipeline.run_cycle().await.unwrap();

        assert!(h.notifier.calls().is_empty());
        assert!(h.history.snapshot().is_empty());
        assert!(matches!(
            report.routes[0].status,
            RouteStatus::FetchFailed {
                carried_forward: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_history_load_failure_aborts_without_writes() {
        let h = harness(&["A"]);
        h.source.set("id-A", stops(&["1"]));
        *h.history.fail_load.lock().unwrap() = true;

        let err = h.pipeline.run_cycle().await.unwrap_err();

        assert!(matches!(err, AppError::History(_)));
        assert!(h.source.calls.lock().unwrap().is_empty());
        assert!(h.notifier.calls().is_empty());
        assert_eq!(*h.history.replace_count.lock().unwrap(), 0);
        assert!(h.documents.get(collections::BUS_ROUTE).is_none());
    }

    #[tokio::test]
    async fn test_history_write_failure_skips_collection() {
        let h = harness(&["A"]);
        h.source.set("id-A", stops(&["1"]));
        *h.history.fail_replace.lock().unwrap() = true;

        assert!(h.pipeline.run_cycle().await.is_err());
        assert!(h.documents.get(collections::BUS_ROUTE).is_none());
    }

    #[tokio::test]
    async fn test_notify_failure_keeps_history_and_alerts() {
        let h = harness(&["A", "B"]);
        let a_stops = stops(&["1"]);
        h.source.set("id-A", a_stops.clone());
        h.source.set("id-B", stops(&["2"]));
        *h.notifier.fail.lock().unwrap() = true;

        let report = h.pipeline.run_cycle().await.unwrap();

        // Both routes attempted despite the first failure.
        assert_eq!(h.notifier.calls().len(), 2);
        assert_eq!(report.notify_failures(), 2);
        assert_eq!(h.history.snapshot()["A"], fingerprint(&a_stops));

        let alerts = h.alerts.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].level, crate::services::AlertLevel::Warning);
        assert_eq!(alerts[0].data["route"], "A");
    }

    #[tokio::test]
    async fn test_stale_history_entries_are_dropped() {
        let h = harness(&["A"]);
        seed(&h, "retired", fingerprint(&stops(&["1"])));
        h.source.set("id-A", Vec::new());

        h.pipeline.run_cycle().await.unwrap();

        assert!(h.history.snapshot().is_empty());
        assert!(h.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_collection_documents() {
        let h = harness(&["A", "B"]);
        h.source.set("id-A", stops(&["1"]));
        h.source.set("id-B", Vec::new());

        h.pipeline.run_cycle().await.unwrap();

        let docs = h.documents.get(collections::BUS_ROUTE).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["detoured"], true);
        assert_eq!(docs[0]["detouredStops"][0]["stopId"], "1");
        assert_eq!(docs[1]["detoured"], false);
        assert!(docs[1]["fingerprint"].is_null());
    }

    #[tokio::test]
    async fn test_outcome_records_observation_time() {
        let h = harness(&["A"]);
        h.source.set("id-A", stops(&["1"]));

        let report = h.pipeline.run_cycle().await.unwrap();

        let RouteStatus::Observed { observed_at, .. } = &report.routes[0].status else {
            panic!("expected an observed route");
        };
        assert!(report.started_at <= *observed_at && *observed_at <= report.finished_at);

        let docs = h.documents.get(collections::BUS_ROUTE).unwrap();
        let outcome = serde_json::to_value(&report.routes[0]).unwrap();
        assert_eq!(outcome["status"], "observed");
        assert_eq!(outcome["observed_at"], docs[0]["observedAt"]);
    }
}
