//! devlog Core
//!
//! Core types, configuration and errors shared by the devlog sinks and dispatcher.

pub mod config;
pub mod error;
pub mod log_entry;
pub mod traits;
pub mod watch;

// Re-export commonly used types
pub use config::{Config, StorageStrategy, SweepPolicy};
pub use error::{DevlogError, OutputError, Result};
pub use log_entry::{LogEntry, LogKind, LogLevel, Message};
pub use traits::{Clock, ManualClock, SystemClock};
pub use watch::{Subscription, Watched};
