//! Structured configuration issues.
//!
//! Configuration loaders collect every problem they find instead of failing
//! on the first one. Callers print warnings and refuse to start on errors.
//!
//! # Examples
//!
//! ```
//! use council_domain::config::validation::{ConfigIssue, Severity, has_errors};
//!
//! let issues = vec![ConfigIssue::job_timeout_exceeds_ack_deadline(700, 600)];
//! assert!(has_errors(&issues));
//! assert_eq!(issues[0].severity, Severity::Error);
//! ```

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// Job timeout exceeds the queue's ack deadline: a slow job races its
    /// own redelivery.
    JobTimeoutExceedsAckDeadline,
    /// Deadline extension margin is not smaller than the ack deadline.
    ExtendMarginTooLarge,
    /// Persona weights are invalid (empty roster, duplicates, bad sum).
    InvalidPersonaWeights,
    /// `[personas.<name>]` names no known persona.
    UnknownPersona { name: String },
    /// An enum-valued field holds an unknown string.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// A numeric field is outside its allowed range.
    OutOfRange { field: String },
    /// A model name is empty.
    EmptyModelName { field: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn job_timeout_exceeds_ack_deadline(job_timeout_secs: u64, ack_deadline_secs: u64) -> Self {
        Self {
            severity: Severity::Error,
            code: ConfigIssueCode::JobTimeoutExceedsAckDeadline,
            message: format!(
                "pipeline.job_timeout_secs ({}) must not exceed worker.ack_deadline_secs ({})",
                job_timeout_secs, ack_deadline_secs
            ),
        }
    }

    pub fn out_of_range(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            severity: Severity::Error,
            message: format!("{}: {}", field, message.into()),
            code: ConfigIssueCode::OutOfRange { field },
        }
    }

    pub fn invalid_enum(field: impl Into<String>, value: impl Into<String>, valid: &[&str]) -> Self {
        let field = field.into();
        let value = value.into();
        Self {
            severity: Severity::Error,
            message: format!(
                "{}: unknown value '{}' (valid: {})",
                field,
                value,
                valid.join(", ")
            ),
            code: ConfigIssueCode::InvalidEnumValue {
                field,
                value,
                valid_values: valid.iter().map(|v| v.to_string()).collect(),
            },
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

/// Whether any issue is fatal.
pub fn has_errors(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}
