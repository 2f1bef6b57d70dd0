//! Common utilities shared across all services.
//!
//! This crate provides:
//! - Configuration structures
//! - Tracing subscriber setup

pub mod config;
pub mod telemetry;

pub use config::*;
pub use telemetry::init_tracing;
