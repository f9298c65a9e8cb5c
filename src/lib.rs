// src/lib.rs

//! smus crawler library
//!
//! Watches Seoul bus routes for detours and keeps the transit and campus
//! notice collections current.

pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod utils;
