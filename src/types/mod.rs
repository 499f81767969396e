//! Core types for the dining table.
//!
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for the table, timing and reporter

mod config;
mod errors;

pub use config::{
    Config, ObservabilityConfig, ReporterConfig, Strategy, TableConfig, TimingConfig,
};
pub use errors::{Error, Result};
