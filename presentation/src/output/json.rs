//! JSON output for scripting (`--json`)

use crate::output::formatter::OutputFormatter;
use council_domain::{ConfigIssue, RunAggregate, RunDiff, Severity};
use serde::Serialize;

/// Pretty-printed JSON of the stored records
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn to_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Serialize)]
struct IssueRow<'a> {
    severity: &'static str,
    message: &'a str,
}

impl OutputFormatter for JsonFormatter {
    fn format_run(&self, aggregate: &RunAggregate) -> String {
        Self::to_json(aggregate)
    }

    fn format_diff(&self, diff: &RunDiff) -> String {
        Self::to_json(diff)
    }

    fn format_issues(&self, issues: &[ConfigIssue]) -> String {
        let rows: Vec<IssueRow<'_>> = issues
            .iter()
            .map(|issue| IssueRow {
                severity: match issue.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                },
                message: &issue.message,
            })
            .collect();
        Self::to_json(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use council_domain::{ModelParams, Run, RunInput, VersionTags};

    #[test]
    fn test_run_serializes_with_status() {
        let run = Run::new_initial(
            RunInput::idea("Dark mode"),
            ModelParams::default(),
            VersionTags::default(),
            Utc::now(),
        );
        let json = JsonFormatter.format_run(&RunAggregate::new(run.clone()));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["run"]["id"], run.id.to_string());
        assert_eq!(value["run"]["status"], "queued");
        assert!(value["decision"].is_null());
    }

    #[test]
    fn test_issues_as_rows() {
        let issues = vec![ConfigIssue::job_timeout_exceeds_ack_deadline(700, 600)];
        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter.format_issues(&issues)).unwrap();
        assert_eq!(value[0]["severity"], "error");
        assert!(value[0]["message"].as_str().unwrap().contains("700"));
    }
}
