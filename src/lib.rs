//! Spectre - Scheduled confluence-scored trading signal engine

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use config::{Config, HistoryPolicy};
pub use error::{Result, SignalError};
pub use services::{SignalScheduler, TickOutcome};
pub use types::*;
