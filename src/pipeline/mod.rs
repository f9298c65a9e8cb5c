//! Pipeline stages and jobs.
//!
//! - `fingerprint` / `classify`: pure detour state comparison
//! - `detour`: the route poll cycle
//! - `notices`: bus and school notice collection cycles
//! - `schedule`: periodic execution of the above

pub mod circuit_breaker;
pub mod classify;
pub mod detour;
pub mod fingerprint;
pub mod notices;
pub mod schedule;

#[cfg(test)]
pub(crate) mod testing;

pub use circuit_breaker::{CircuitBreaker, Verdict};
pub use classify::{Transition, classify};
pub use detour::{CycleReport, DetourPipeline, RouteOutcome, RouteStatus};
pub use fingerprint::fingerprint;
pub use notices::{BusNoticePipeline, NoticeReport, SchoolNoticePipeline};
pub use schedule::{Job, Scheduler, run_reporting};
