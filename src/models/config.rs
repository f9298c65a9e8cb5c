//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Route;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Bus arrival API and watched routes
    #[serde(default)]
    pub bus: BusConfig,

    /// Detour notification endpoint
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Failure channel (Slack)
    #[serde(default)]
    pub alert: AlertConfig,

    /// Notice board sources
    #[serde(default)]
    pub notices: NoticeConfig,

    /// Text recognition for notice images
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Job intervals
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Override secrets from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = value;
            }
        };

        set(&mut self.bus.service_key, "OPEN_API_KEY");
        set(&mut self.notifier.secret_key, "NOTIFY_SECRET_KEY");
        set(&mut self.alert.bot_token, "SLACK_BOT_TOKEN");
        set(&mut self.alert.channel, "SLACK_ERROR_CHANNEL");
        set(&mut self.ocr.api_key, "VISION_API_KEY");
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.bus.routes.is_empty() {
            return Err(AppError::validation("No bus routes defined"));
        }

        let mut names = std::collections::HashSet::new();
        for route in &self.bus.routes {
            if route.route_id.trim().is_empty() || route.display_name.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "bus route {:?} needs both route_id and display_name",
                    route
                )));
            }
            if !names.insert(route.display_name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate bus route display_name: {}",
                    route.display_name
                )));
            }
        }

        if self.notifier.enabled && self.notifier.base_url.trim().is_empty() {
            return Err(AppError::validation(
                "notifier.base_url is empty while notifier is enabled",
            ));
        }
        if self.alert.enabled && self.alert.channel.trim().is_empty() {
            return Err(AppError::validation(
                "alert.channel is empty while alerts are enabled",
            ));
        }
        if self.notices.max_drop_percent > 100 {
            return Err(AppError::validation(
                "notices.max_drop_percent must be within 0..=100",
            ));
        }
        if self.schedule.detour_interval_secs == 0
            || self.schedule.bus_notice_interval_secs == 0
            || self.schedule.school_notice_interval_secs == 0
        {
            return Err(AppError::validation("schedule intervals must be > 0"));
        }
        Ok(())
    }

    /// Route numbers used to filter OCR tokens.
    pub fn bus_numbers(&self) -> Vec<String> {
        self.bus
            .routes
            .iter()
            .map(|r| r.display_name.clone())
            .collect()
    }
}

/// HTTP client behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Timeout in seconds applied to every outbound request
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between route fetches in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// Bus arrival API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// `getArrInfoByRouteAll` endpoint
    #[serde(default = "defaults::bus_api_url")]
    pub api_url: String,

    /// Open API service key
    #[serde(default)]
    pub service_key: String,

    /// Routes polled every detour cycle, in order
    #[serde(default = "defaults::routes")]
    pub routes: Vec<Route>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::bus_api_url(),
            service_key: String::new(),
            routes: defaults::routes(),
        }
    }
}

/// Detour notification endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifierConfig {
    /// When false, transitions are only logged
    #[serde(default)]
    pub enabled: bool,

    /// Base URL; operations are appended as path segments
    #[serde(default)]
    pub base_url: String,

    /// Shared secret sent with every call
    #[serde(default)]
    pub secret_key: String,
}

/// Slack failure channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// When false, alerts are written to the log only
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::slack_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub channel: String,

    /// Source identifier placed in every alert
    #[serde(default = "defaults::alert_host")]
    pub host: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: defaults::slack_api_url(),
            bot_token: String::new(),
            channel: String::new(),
            host: defaults::alert_host(),
        }
    }
}

/// Notice board sources and collection safety limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeConfig {
    /// TOPIS notice list endpoint
    #[serde(default = "defaults::topis_url")]
    pub topis_url: String,

    /// Title search keyword for detour notices
    #[serde(default = "defaults::search_keyword")]
    pub search_keyword: String,

    #[serde(default = "defaults::record_per_page")]
    pub record_per_page: u32,

    /// University notice listing page
    #[serde(default = "defaults::school_url")]
    pub school_url: String,

    /// Campus code (`smu` Seoul, `smuc` Cheonan)
    #[serde(default = "defaults::campus")]
    pub campus: String,

    #[serde(default = "defaults::article_limit")]
    pub article_limit: u32,

    /// Maximum allowed drop in collection size (0-100)
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Stored count below which the drop check is skipped
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            topis_url: defaults::topis_url(),
            search_keyword: defaults::search_keyword(),
            record_per_page: defaults::record_per_page(),
            school_url: defaults::school_url(),
            campus: defaults::campus(),
            article_limit: defaults::article_limit(),
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

/// Google Cloud Vision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// When false, notice images are listed but not recognized
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::vision_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    /// Extra download attempts per image
    #[serde(default = "defaults::download_retries")]
    pub download_retries: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: defaults::vision_endpoint(),
            api_key: String::new(),
            download_retries: defaults::download_retries(),
        }
    }
}

/// Intervals between job runs, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "defaults::detour_interval")]
    pub detour_interval_secs: u64,

    #[serde(default = "defaults::notice_interval")]
    pub bus_notice_interval_secs: u64,

    #[serde(default = "defaults::notice_interval")]
    pub school_notice_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            detour_interval_secs: defaults::detour_interval(),
            bus_notice_interval_secs: defaults::notice_interval(),
            school_notice_interval_secs: defaults::notice_interval(),
        }
    }
}

mod defaults {
    use crate::models::Route;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; smus-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn request_delay() -> u64 {
        200
    }

    // Bus defaults
    pub fn bus_api_url() -> String {
        "http://ws.bus.go.kr/api/rest/arrive/getArrInfoByRouteAll".into()
    }
    pub fn routes() -> Vec<Route> {
        vec![
            Route::new("100100447", "7016", "bus7016"),
            Route::new("100100185", "1711", "bus1711"),
            Route::new("100100032", "163", "bus163"),
            Route::new("100900012", "서대문08", "seodaemun08"),
            Route::new("100900002", "종로13", "jongno13"),
        ]
    }

    // Alert defaults
    pub fn slack_api_url() -> String {
        "https://slack.com/api/chat.postMessage".into()
    }
    pub fn alert_host() -> String {
        "BUS Crawling".into()
    }

    // Notice defaults
    pub fn topis_url() -> String {
        "https://topis.seoul.go.kr/notice/selectNoticeList.do".into()
    }
    pub fn search_keyword() -> String {
        "우회".into()
    }
    pub fn record_per_page() -> u32 {
        10
    }
    pub fn school_url() -> String {
        "https://www.smu.ac.kr/kor/life/notice.do".into()
    }
    pub fn campus() -> String {
        "smu".into()
    }
    pub fn article_limit() -> u32 {
        100
    }
    pub fn max_drop_percent() -> u8 {
        50
    }
    pub fn min_baseline() -> usize {
        5
    }

    // OCR defaults
    pub fn vision_endpoint() -> String {
        "https://vision.googleapis.com/v1/images:annotate".into()
    }
    pub fn download_retries() -> u32 {
        2
    }

    // Schedule defaults
    pub fn detour_interval() -> u64 {
        30 * 60
    }
    pub fn notice_interval() -> u64 {
        60 * 60
    }
}
