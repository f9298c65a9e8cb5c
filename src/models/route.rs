//! Bus route and detour snapshot types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::fingerprint;

/// A watched bus route, loaded once from configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    /// Upstream route identifier (`busRouteId`, not the route number)
    pub route_id: String,

    /// Route number shown to riders (e.g. "7016"); also the history key
    pub display_name: String,

    /// Token identifying this route to the notification service
    pub notification_kind: String,
}

impl Route {
    pub fn new(
        route_id: impl Into<String>,
        display_name: impl Into<String>,
        notification_kind: impl Into<String>,
    ) -> Self {
        Self {
            route_id: route_id.into(),
            display_name: display_name.into(),
            notification_kind: notification_kind.into(),
        }
    }
}

/// A stop the bus is currently routed around.
///
/// Field order is part of the fingerprint's canonical form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct StopRecord {
    pub stop_name: String,
    pub stop_id: String,
}

impl StopRecord {
    pub fn new(stop_name: impl Into<String>, stop_id: impl Into<String>) -> Self {
        Self {
            stop_name: stop_name.into(),
            stop_id: stop_id.into(),
        }
    }
}

/// Hex-encoded digest of an ordered stop list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detour state of one route as observed in one poll cycle.
///
/// The fingerprint is derived on construction, so a snapshot without
/// detoured stops never carries one.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    route: Route,
    detoured_stops: Vec<StopRecord>,
    fingerprint: Option<Fingerprint>,
    observed_at: DateTime<Utc>,
}

impl RouteSnapshot {
    pub fn new(route: Route, detoured_stops: Vec<StopRecord>, observed_at: DateTime<Utc>) -> Self {
        let fingerprint = if detoured_stops.is_empty() {
            None
        } else {
            Some(fingerprint(&detoured_stops))
        };

        Self {
            route,
            detoured_stops,
            fingerprint,
            observed_at,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn detoured_stops(&self) -> &[StopRecord] {
        &self.detoured_stops
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn is_detoured(&self) -> bool {
        !self.detoured_stops.is_empty()
    }

    /// Document written to the `bus_route` collection.
    pub fn to_document(&self) -> RouteDocument<'_> {
        RouteDocument {
            bus_name: &self.route.display_name,
            bus_id: &self.route.route_id,
            notification_kind: &self.route.notification_kind,
            detoured: self.is_detoured(),
            detoured_stops: &self.detoured_stops,
            fingerprint: self.fingerprint.as_ref(),
            observed_at: self.observed_at,
        }
    }
}

/// Serialized form of a [`RouteSnapshot`] for external readers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDocument<'a> {
    pub bus_name: &'a str,
    pub bus_id: &'a str,
    pub notification_kind: &'a str,
    pub detoured: bool,
    pub detoured_stops: &'a [StopRecord],
    pub fingerprint: Option<&'a Fingerprint>,
    pub observed_at: DateTime<Utc>,
}
