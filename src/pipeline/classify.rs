//! Detour transition classification.
//!
//! Compares the last persisted fingerprint of a route with the stops seen
//! in the current poll and decides which notification, if any, to send.
//!
//! | previous | current stops | transition |
//! |----------|---------------|------------|
//! | absent   | empty         | `None`     |
//! | absent   | non-empty     | `Started`  |
//! | present  | empty         | `Ended`    |
//! | present  | same hash     | `None`     |
//! | present  | other hash    | `Updated`  |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Fingerprint, StopRecord};
use crate::pipeline::fingerprint;

/// How a route's detour state moved between two consecutive polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    None,
    Started,
    Updated,
    Ended,
}

impl Transition {
    /// Whether a notification is due.
    pub fn is_change(self) -> bool {
        self != Transition::None
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::None => "none",
            Transition::Started => "started",
            Transition::Updated => "updated",
            Transition::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Classify from the previous fingerprint and the current stop list.
pub fn classify(previous: Option<&Fingerprint>, current_stops: &[StopRecord]) -> Transition {
    if current_stops.is_empty() {
        return classify_fingerprints(previous, None);
    }
    let current = fingerprint(current_stops);
    classify_fingerprints(previous, Some(&current))
}

/// Classify from two already-computed fingerprints.
///
/// `current` must be `None` exactly when the current stop list is empty.
fn classify_fingerprints(
    previous: Option<&Fingerprint>,
    current: Option<&Fingerprint>,
) -> Transition {
    match (previous, current) {
        (None, None) => Transition::None,
        (None, Some(_)) => Transition::Started,
        (Some(_), None) => Transition::Ended,
        (Some(prev), Some(curr)) if prev != curr => Transition::Updated,
        (Some(_), Some(_)) => Transition::None,
    }
}
