//! Output formatting

pub mod console;
pub mod formatter;
pub mod json;

pub use console::ConsoleFormatter;
pub use formatter::OutputFormatter;
pub use json::JsonFormatter;
