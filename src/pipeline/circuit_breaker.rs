//! Circuit breaker for notice collection rewrites.
//!
//! Notice collections are dropped and rewritten every cycle. A broken
//! scraper (changed markup, blocked request) shows up as a sudden collapse
//! in the number of documents, so the rewrite is refused when the count
//! falls by more than `max_drop_percent` of what is stored.
//!
//! Collections holding fewer than `min_baseline` documents are always
//! replaced, including with an empty batch. Above the baseline an empty
//! batch counts as a 100% drop, so `max_drop_percent = 100` turns the
//! breaker off.

use crate::error::{AppError, Result};
use crate::models::NoticeConfig;

/// Decision for one rewrite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Too few stored documents to judge a drop
    BelowBaseline,
    /// Drop (or growth) within the allowed range
    Within { drop_percent: f64 },
    /// Drop beyond the allowed range; the rewrite must not happen
    Tripped { drop_percent: f64 },
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    max_drop_percent: u8,
    min_baseline: usize,
}

impl CircuitBreaker {
    pub fn new(max_drop_percent: u8, min_baseline: usize) -> Self {
        Self {
            max_drop_percent: max_drop_percent.min(100),
            min_baseline,
        }
    }

    pub fn from_config(config: &NoticeConfig) -> Self {
        Self::new(config.max_drop_percent, config.min_baseline)
    }

    /// Judge replacing `stored` documents with `incoming` documents.
    pub fn check(&self, stored: usize, incoming: usize) -> Verdict {
        if stored == 0 || stored < self.min_baseline {
            return Verdict::BelowBaseline;
        }

        let lost = stored.saturating_sub(incoming);
        let drop_percent = lost as f64 * 100.0 / stored as f64;
        if drop_percent > f64::from(self.max_drop_percent) {
            Verdict::Tripped { drop_percent }
        } else {
            Verdict::Within { drop_percent }
        }
    }

    /// Like [`check`](Self::check), logging the verdict and turning a trip
    /// into [`AppError::CircuitBreakerTriggered`].
    pub fn guard(&self, collection: &str, stored: usize, incoming: usize) -> Result<()> {
        match self.check(stored, incoming) {
            Verdict::BelowBaseline => {
                log::info!(
                    "[{}] {} stored documents is below the baseline of {}, replacing with {}",
                    collection,
                    stored,
                    self.min_baseline,
                    incoming
                );
                Ok(())
            }
            Verdict::Within { drop_percent } => {
                log::debug!(
                    "[{}] {} → {} documents ({:.1}% drop)",
                    collection,
                    stored,
                    incoming,
                    drop_percent
                );
                Ok(())
            }
            Verdict::Tripped { drop_percent } => {
                log::error!(
                    "[{}] refusing rewrite: {} → {} documents ({:.1}% drop > {}%)",
                    collection,
                    stored,
                    incoming,
                    drop_percent,
                    self.max_drop_percent
                );
                Err(AppError::CircuitBreakerTriggered {
                    collection: collection.to_string(),
                    current_count: incoming,
                    previous_count: stored,
                    drop_percent,
                    threshold_percent: self.max_drop_percent,
                })
            }
        }
    }
}
