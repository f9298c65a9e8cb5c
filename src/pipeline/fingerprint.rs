//! Content fingerprint of a detoured-stop list.
//!
//! The canonical form is the compact JSON array of stop objects with the
//! field order fixed by [`StopRecord`]'s declaration (`stopName`, `stopId`).
//! JSON string escaping keeps differently-split lists from serializing to
//! the same bytes. The digest is SHA-256, hex encoded, so values stay
//! comparable across process restarts.

use sha2::{Digest, Sha256};

use crate::models::{Fingerprint, StopRecord};

/// Canonical bytes hashed by [`fingerprint`].
pub fn canonical_bytes(stops: &[StopRecord]) -> Vec<u8> {
    // Plain string fields with derived `Serialize` have no failing path.
    serde_json::to_vec(stops).expect("stop records serialize to JSON")
}

/// Deterministic digest of an ordered stop list.
pub fn fingerprint(stops: &[StopRecord]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(stops));
    Fingerprint::from_hex(hex::encode(hasher.finalize()))
}
