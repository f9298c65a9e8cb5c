//! In-memory fakes shared by pipeline tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Route, StopRecord};
use crate::services::{Alert, AlertSink, DetourNotifier, RouteStatusSource, TextRecognizer};
use crate::storage::{DocumentStore, History, HistoryStore, WriteMetadata};

/// Route source answering from a per-route script.
#[derive(Default)]
pub struct FakeSource {
    responses: Mutex<HashMap<String, std::result::Result<Vec<StopRecord>, String>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn set(&self, route_id: &str, stops: Vec<StopRecord>) {
        self.responses
            .lock()
            .unwrap()
            .insert(route_id.to_string(), Ok(stops));
    }

    pub fn fail(&self, route_id: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(route_id.to_string(), Err(message.to_string()));
    }
}

#[async_trait]
impl RouteStatusSource for FakeSource {
    async fn detoured_stops(&self, route: &Route) -> Result<Vec<StopRecord>> {
        self.calls.lock().unwrap().push(route.route_id.clone());
        match self.responses.lock().unwrap().get(&route.route_id) {
            Some(Ok(stops)) => Ok(stops.clone()),
            Some(Err(message)) => Err(AppError::upstream(&route.display_name, message)),
            None => Ok(Vec::new()),
        }
    }
}

/// Notifier recording `(operation, display_name)` pairs.
#[derive(Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<(&'static str, String)>>,
    pub fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, op: &'static str, route: &Route) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((op, route.display_name.clone()));
        if *self.fail.lock().unwrap() {
            return Err(AppError::notify(&route.display_name, "HTTP 502"));
        }
        Ok(())
    }
}

#[async_trait]
impl DetourNotifier for RecordingNotifier {
    async fn detour_start(&self, route: &Route) -> Result<()> {
        self.record("start", route)
    }
    async fn detour_update(&self, route: &Route) -> Result<()> {
        self.record("update", route)
    }
    async fn detour_finish(&self, route: &Route) -> Result<()> {
        self.record("finish", route)
    }
}

/// History store kept in memory, with switchable failures.
#[derive(Default)]
pub struct MemoryHistory {
    pub state: Mutex<History>,
    pub fail_load: Mutex<bool>,
    pub fail_replace: Mutex<bool>,
    pub replace_count: Mutex<usize>,
}

impl MemoryHistory {
    pub fn snapshot(&self) -> History {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn load_history(&self) -> Result<History> {
        if *self.fail_load.lock().unwrap() {
            return Err(AppError::history("permission denied"));
        }
        Ok(self.snapshot())
    }

    async fn replace_history(&self, history: &History) -> Result<()> {
        if *self.fail_replace.lock().unwrap() {
            return Err(AppError::history("disk full"));
        }
        *self.state.lock().unwrap() = history.clone();
        *self.replace_count.lock().unwrap() += 1;
        Ok(())
    }
}

/// Document store kept in memory.
#[derive(Default)]
pub struct MemoryDocuments {
    pub collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryDocuments {
    pub fn get(&self, name: &str) -> Option<Vec<Value>> {
        self.collections.lock().unwrap().get(name).cloned()
    }

    pub fn put(&self, name: &str, documents: Vec<Value>) {
        self.collections
            .lock()
            .unwrap()
            .insert(name.to_string(), documents);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    async fn replace_collection(&self, name: &str, documents: Vec<Value>) -> Result<WriteMetadata> {
        let count = documents.len();
        self.put(name, documents);
        Ok(WriteMetadata {
            count,
            location: format!("memory://{name}"),
            timestamp: Utc::now(),
        })
    }

    async fn load_collection(&self, name: &str) -> Result<Vec<Value>> {
        Ok(self.get(name).unwrap_or_default())
    }
}

/// Alert sink recording every alert.
#[derive(Default)]
pub struct RecordingAlerts {
    pub alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlerts {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlerts {
    async fn send(&self, alert: &Alert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Recognizer that treats the image bytes as UTF-8 text.
#[derive(Default)]
pub struct TextBytesRecognizer {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl TextRecognizer for TextBytesRecognizer {
    async fn recognize(&self, image: &[u8]) -> Result<BTreeSet<String>> {
        *self.calls.lock().unwrap() += 1;
        let text = String::from_utf8_lossy(image);
        Ok(crate::services::ocr::split_lines(&text))
    }
}
