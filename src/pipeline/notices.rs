// src/pipeline/notices.rs

//! Notice board pipelines.
//!
//! Both boards are scraped in full every cycle and their collections are
//! dropped and rewritten. The circuit breaker guards each rewrite against
//! a scraper that suddenly returns far fewer documents than are stored.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::Result;
use crate::models::{BusNotice, Config, OcrRecord};
use crate::services::alert::{self, Alert, AlertSink};
use crate::services::bus_notices::{BusNoticeSource, extract_content};
use crate::services::ocr::TextRecognizer;
use crate::services::school_notices::SchoolNoticeSource;
use crate::storage::{DocumentStore, collections};

use super::circuit_breaker::CircuitBreaker;

/// Counters from one notice cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NoticeReport {
    pub notices: usize,
    /// Images answered from the OCR cache
    pub ocr_cached: usize,
    /// Images recognized this cycle
    pub ocr_recognized: usize,
    /// Images whose download or recognition failed
    pub ocr_failed: usize,
    /// Listing rows that could not be parsed
    pub skipped: usize,
}

/// Replace `name` with `documents` once the circuit breaker allows it.
async fn guarded_replace(
    documents: &dyn DocumentStore,
    breaker: &CircuitBreaker,
    name: &str,
    batch: Vec<Value>,
) -> Result<()> {
    let previous = documents.load_collection(name).await?.len();
    breaker.guard(name, previous, batch.len())?;
    let meta = documents.replace_collection(name, batch).await?;
    log::info!("Saved {} documents to {}", meta.count, meta.location);
    Ok(())
}

/// TOPIS detour notices with OCR'd route numbers.
pub struct BusNoticePipeline {
    source: Arc<dyn BusNoticeSource>,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    documents: Arc<dyn DocumentStore>,
    alerts: Arc<dyn AlertSink>,
    breaker: CircuitBreaker,
    bus_numbers: BTreeSet<String>,
    alert_host: String,
}

impl BusNoticePipeline {
    /// `recognizer` is `None` when OCR is disabled; images are then
    /// listed without route numbers.
    pub fn new(
        config: &Config,
        source: Arc<dyn BusNoticeSource>,
        recognizer: Option<Arc<dyn TextRecognizer>>,
        documents: Arc<dyn DocumentStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            source,
            recognizer,
            documents,
            alerts,
            breaker: CircuitBreaker::from_config(&config.notices),
            bus_numbers: config.bus_numbers().into_iter().collect(),
            alert_host: config.alert.host.clone(),
        }
    }

    pub async fn run_cycle(&self) -> Result<NoticeReport> {
        let raw = self.source.fetch_notices().await?;
        let base = self.source.base_url()?;
        log::info!("Bus notices: {} rows", raw.len());

        let mut cache = self.load_ocr_cache().await?;
        let cached_before = cache.len();
        let mut report = NoticeReport::default();
        let mut batch = Vec::with_capacity(raw.len());

        for row in raw {
            let content = extract_content(&row.content_html, &base)?;

            let mut found = BTreeSet::new();
            for url in &content.image_urls {
                if let Some(numbers) = cache.get(url) {
                    report.ocr_cached += 1;
                    found.extend(numbers.iter().cloned());
                    continue;
                }
                let Some(recognizer) = &self.recognizer else {
                    continue;
                };
                match self.recognize(recognizer.as_ref(), url).await {
                    Ok(numbers) => {
                        report.ocr_recognized += 1;
                        found.extend(numbers.iter().cloned());
                        cache.insert(url.clone(), numbers);
                    }
                    Err(e) => {
                        report.ocr_failed += 1;
                        log::warn!("  ✗ OCR of {} failed: {}", url, e);
                        let alert = Alert::warning(
                            &self.alert_host,
                            "사진 인식에 실패해 다음 크롤링에서 다시 시도합니다.",
                            json!({ "imageURL": url, "notice": row.number, "error": e.to_string() }),
                        );
                        alert::send_or_log(self.alerts.as_ref(), &alert).await;
                    }
                }
            }

            let notice = BusNotice {
                number: row.number,
                created_time: row.created_time,
                updated_time: row.updated_time,
                title: row.title,
                image_urls: content.image_urls,
                content: content.text,
                bus_numbers: found.into_iter().collect(),
            };
            batch.push(serde_json::to_value(&notice)?);
        }
        report.notices = batch.len();

        if cache.len() > cached_before {
            self.save_ocr_cache(&cache).await?;
        }
        guarded_replace(
            self.documents.as_ref(),
            &self.breaker,
            collections::BUS_NOTICE,
            batch,
        )
        .await?;

        log::info!(
            "Bus notices done: {} notices, {} images recognized, {} cached, {} failed",
            report.notices,
            report.ocr_recognized,
            report.ocr_cached,
            report.ocr_failed
        );
        Ok(report)
    }

    /// Download and recognize one image, keeping only watched route numbers.
    async fn recognize(&self, recognizer: &dyn TextRecognizer, url: &str) -> Result<BTreeSet<String>> {
        let image = self.source.fetch_image(url).await?;
        let lines = recognizer.recognize(&image).await?;
        Ok(lines.intersection(&self.bus_numbers).cloned().collect())
    }

    async fn load_ocr_cache(&self) -> Result<HashMap<String, BTreeSet<String>>> {
        let documents = self.documents.load_collection(collections::OCR_HISTORY).await?;
        let mut cache = HashMap::with_capacity(documents.len());
        for doc in documents {
            match serde_json::from_value::<OcrRecord>(doc) {
                Ok(record) => {
                    cache.insert(record.url, record.bus_numbers.into_iter().collect());
                }
                Err(e) => log::warn!("Ignoring unreadable OCR cache entry: {}", e),
            }
        }
        Ok(cache)
    }

    async fn save_ocr_cache(&self, cache: &HashMap<String, BTreeSet<String>>) -> Result<()> {
        let mut records: Vec<OcrRecord> = cache
            .iter()
            .map(|(url, numbers)| OcrRecord {
                url: url.clone(),
                bus_numbers: numbers.iter().cloned().collect(),
            })
            .collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));

        let documents = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.documents
            .replace_collection(collections::OCR_HISTORY, documents)
            .await?;
        Ok(())
    }
}

/// University notice listing.
pub struct SchoolNoticePipeline {
    source: Arc<dyn SchoolNoticeSource>,
    documents: Arc<dyn DocumentStore>,
    breaker: CircuitBreaker,
}

impl SchoolNoticePipeline {
    pub fn new(
        config: &Config,
        source: Arc<dyn SchoolNoticeSource>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            source,
            documents,
            breaker: CircuitBreaker::from_config(&config.notices),
        }
    }

    pub async fn run_cycle(&self) -> Result<NoticeReport> {
        let listing = self.source.fetch_listing().await?;
        log::info!(
            "School notices: {} parsed, {} skipped",
            listing.notices.len(),
            listing.skipped
        );

        let batch = listing
            .notices
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let report = NoticeReport {
            notices: batch.len(),
            skipped: listing.skipped,
            ..Default::default()
        };

        guarded_replace(
            self.documents.as_ref(),
            &self.breaker,
            collections::SCHOOL_NOTICE,
            batch,
        )
        .await?;
        Ok(report)
    }
}
