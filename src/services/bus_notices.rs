// src/services/bus_notices.rs

//! TOPIS detour notice crawler.
//!
//! The notice list endpoint answers a form POST with JSON rows whose body
//! (`bdwrCts`) is an HTML fragment, usually a few paragraphs plus route
//! map images.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use scraper::{Html, Node, Selector};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::NoticeConfig;
use crate::utils::http::fetch_bytes_with_retry;
use crate::utils::normalize_image_url;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A notice row before image recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBusNotice {
    pub number: i64,
    pub created_time: NaiveDateTime,
    pub updated_time: NaiveDateTime,
    pub title: String,
    pub content_html: String,
}

/// Images and text extracted from a notice body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeContent {
    pub image_urls: Vec<String>,
    pub text: String,
}

/// Where detour notices and their images come from.
#[async_trait]
pub trait BusNoticeSource: Send + Sync {
    /// Latest notices, newest first.
    async fn fetch_notices(&self) -> Result<Vec<RawBusNotice>>;

    /// Download an attached image.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;

    /// Base URL for resolving relative image sources.
    fn base_url(&self) -> Result<Url>;
}

/// Client for the TOPIS notice list.
pub struct BusNoticeCrawler {
    client: Client,
    config: NoticeConfig,
    download_retries: u32,
}

impl BusNoticeCrawler {
    pub fn new(client: Client, config: &NoticeConfig) -> Self {
        Self {
            client,
            config: config.clone(),
            download_retries: 0,
        }
    }

    /// Extra attempts for each image download.
    pub fn with_download_retries(mut self, retries: u32) -> Self {
        self.download_retries = retries;
        self
    }

    /// Fetch the first page of notices matching the search keyword.
    pub async fn fetch_list(&self) -> Result<Vec<RawBusNotice>> {
        let page_size = self.config.record_per_page.to_string();
        let body = self
            .client
            .post(&self.config.topis_url)
            .form(&[
                ("pageIndex", "1"),
                ("recordPerPage", page_size.as_str()),
                ("category", "sTtl"),
                ("boardSearch", self.config.search_keyword.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_notice_list(&body)
    }
}

#[async_trait]
impl BusNoticeSource for BusNoticeCrawler {
    async fn fetch_notices(&self) -> Result<Vec<RawBusNotice>> {
        self.fetch_list().await
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        fetch_bytes_with_retry(&self.client, url, self.download_retries).await
    }

    fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.config.topis_url)?)
    }
}

#[derive(Debug, Deserialize)]
struct NoticeListResponse {
    #[serde(default)]
    rows: Vec<NoticeRow>,
}

#[derive(Debug, Deserialize)]
struct NoticeRow {
    #[serde(rename = "bdwrSeq")]
    seq: Value,
    #[serde(rename = "createDate")]
    create_date: String,
    #[serde(rename = "updateDate")]
    update_date: String,
    #[serde(rename = "bdwrTtlNm")]
    title: String,
    #[serde(rename = "bdwrCts", default)]
    content: String,
}

/// Parse the notice list JSON.
pub fn parse_notice_list(body: &str) -> Result<Vec<RawBusNotice>> {
    let response: NoticeListResponse = serde_json::from_str(body)
        .map_err(|e| AppError::parse("bus notice list", e))?;

    response
        .rows
        .into_iter()
        .map(|row| -> Result<RawBusNotice> {
            let number = match &row.seq {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }
            .ok_or_else(|| AppError::parse("bus notice list", format!("bad bdwrSeq {}", row.seq)))?;

            Ok(RawBusNotice {
                number,
                created_time: parse_time(&row.create_date, number)?,
                updated_time: parse_time(&row.update_date, number)?,
                title: row.title.trim().to_string(),
                content_html: row.content,
            })
        })
        .collect()
}

fn parse_time(value: &str, number: i64) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIME_FORMAT).map_err(|e| {
        AppError::parse(
            format!("bus notice {number}"),
            format!("bad timestamp {value:?}: {e}"),
        )
    })
}

/// Extract image URLs and plain text from a notice body.
///
/// Text is the concatenation of the non-empty top-level nodes, one per line.
pub fn extract_content(html: &str, base: &Url) -> Result<NoticeContent> {
    let fragment = Html::parse_fragment(html);
    let img_sel = Selector::parse("img[src]").map_err(|e| AppError::selector("img[src]", format!("{e:?}")))?;

    let image_urls = fragment
        .select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
        .map(|src| normalize_image_url(base, src))
        .collect();

    let mut text = String::new();
    for child in fragment.root_element().children() {
        let chunk: String = match child.value() {
            Node::Text(t) => t.text.to_string(),
            Node::Element(_) => scraper::ElementRef::wrap(child)
                .map(|el| el.text().collect())
                .unwrap_or_default(),
            _ => String::new(),
        };
        if !chunk.is_empty() {
            text.push_str(&chunk);
            text.push('\n');
        }
    }

    Ok(NoticeContent { image_urls, text })
}
