//! Presentation layer for proposal-council
//!
//! This crate contains CLI definitions, output formatters and progress
//! reporters.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, Command, PriorityArg};
pub use output::{ConsoleFormatter, JsonFormatter, OutputFormatter};
pub use progress::reporter::{ProgressReporter, SimpleProgress};
