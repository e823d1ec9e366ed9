//! # vecstat-core
//!
//! Aggregate engine for vecstat.
//!
//! This crate provides:
//! - The set of supported aggregates and their wire codes
//! - Pure max, min, median and mode functions
//! - Command dispatch with empty-input and unknown-command checks

pub mod aggregate;
pub mod engine;
pub mod error;

pub use aggregate::Aggregate;
pub use engine::compute;
pub use error::CoreError;
