//! Service layer for the crawler application.
//!
//! This module contains the outbound integrations:
//! - Bus arrival API (`BusArrivalClient`)
//! - Detour notifications (`HttpNotifier`)
//! - Failure alerts (`SlackAlerter`)
//! - Image text recognition (`VisionRecognizer`)
//! - Notice boards (`BusNoticeCrawler`, `SchoolNoticeCrawler`)

pub mod alert;
pub mod arrivals;
pub mod bus_notices;
pub mod notifier;
pub mod ocr;
pub mod school_notices;

pub use alert::{Alert, AlertLevel, AlertSink, LogAlerter, SlackAlerter};
pub use arrivals::{BusArrivalClient, RouteStatusSource};
pub use bus_notices::{BusNoticeCrawler, BusNoticeSource};
pub use notifier::{DetourNotifier, HttpNotifier, LogNotifier};
pub use ocr::{TextRecognizer, VisionRecognizer};
pub use school_notices::{SchoolNoticeCrawler, SchoolNoticeSource};
