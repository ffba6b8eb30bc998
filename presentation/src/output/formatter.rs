//! Output formatter trait

use council_domain::{ConfigIssue, RunAggregate, RunDiff};

/// Renders command results for the terminal.
///
/// The CLI picks [`ConsoleFormatter`](super::console::ConsoleFormatter) or
/// [`JsonFormatter`](super::json::JsonFormatter) from `--json`.
pub trait OutputFormatter {
    /// A finished (or failed) run: status, proposal, reviews and decision
    fn format_run(&self, aggregate: &RunAggregate) -> String;

    /// Comparison of two runs
    fn format_diff(&self, diff: &RunDiff) -> String;

    /// Configuration validation issues
    fn format_issues(&self, issues: &[ConfigIssue]) -> String;
}
