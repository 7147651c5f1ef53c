//! Core types, engines and trait definitions for Tally, the academic record
//! workflow and attendance aggregation engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod alerts;
pub mod attendance;
pub mod cutoff;
pub mod dashboard;
pub mod error;
pub mod grade;
pub mod identity;
pub mod ranking;
pub mod school;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};
