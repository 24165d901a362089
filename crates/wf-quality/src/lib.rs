//! wf-quality - Data quality checks for Wharf
//!
//! Runs scalar check queries against the warehouse and evaluates each
//! result against its predicate.

pub mod runner;

pub use runner::{CheckResult, CheckSummary, QualityRunner};
