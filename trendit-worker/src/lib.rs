//! # Trendit Worker Library
//!
//! Background maintenance for the Trendit marketplace: expiring abandoned task
//! allocations and reconciling gateway payments that never got a webhook.
//!
//! ## Modules
//!
//! - `jobs`: the individual sweeps
//! - `orchestrator`: runs the sweeps on an interval with graceful shutdown

pub mod jobs;
pub mod orchestrator;
