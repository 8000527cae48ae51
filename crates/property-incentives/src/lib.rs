//! Incentive analysis for commercial properties.
//!
//! An address is evaluated against five independent incentive programs, the
//! per-program outcomes are normalized into a single [`incentives::Analysis`],
//! and a financial report with stacking recommendations can be compiled from it.

pub mod config;
pub mod error;
pub mod incentives;
pub mod telemetry;
