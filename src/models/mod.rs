// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod notice;
mod route;

// Re-export all public types
pub use config::{
    AlertConfig, BusConfig, Config, CrawlerConfig, NoticeConfig, NotifierConfig, OcrConfig,
    ScheduleConfig,
};
pub use notice::{BusNotice, OcrRecord, SchoolNotice};
pub use route::{Fingerprint, Route, RouteDocument, RouteSnapshot, StopRecord};
