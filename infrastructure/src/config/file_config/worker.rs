//! Worker and pipeline timing from TOML (`[worker]` and `[pipeline]` sections)

use council_application::config::{PipelineParams, WorkerParams};
use council_domain::config::validation::{ConfigIssue, ConfigIssueCode, Severity};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw worker configuration from TOML
///
/// # Example
///
/// ```toml
/// [worker]
/// max_concurrency = 4
/// ack_deadline_secs = 600      # queue redelivery deadline
/// extend_margin_secs = 60      # extend when this much of the deadline remains
/// shutdown_grace_secs = 30
/// receive_wait_ms = 1000
/// max_deliveries = 5           # give up on a retryable failure after this many
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWorkerConfig {
    pub max_concurrency: usize,
    pub ack_deadline_secs: u64,
    pub extend_margin_secs: u64,
    pub shutdown_grace_secs: u64,
    pub receive_wait_ms: u64,
    pub max_deliveries: u32,
}

impl Default for FileWorkerConfig {
    fn default() -> Self {
        let defaults = WorkerParams::default();
        Self {
            max_concurrency: defaults.max_concurrency,
            ack_deadline_secs: defaults.ack_deadline.as_secs(),
            extend_margin_secs: defaults.extend_margin.as_secs(),
            shutdown_grace_secs: defaults.shutdown_grace.as_secs(),
            receive_wait_ms: defaults.receive_wait.as_millis() as u64,
            max_deliveries: defaults.max_deliveries,
        }
    }
}

impl FileWorkerConfig {
    pub fn to_params(&self) -> WorkerParams {
        WorkerParams::default()
            .with_max_concurrency(self.max_concurrency)
            .with_ack_deadline(Duration::from_secs(self.ack_deadline_secs))
            .with_extend_margin(Duration::from_secs(self.extend_margin_secs))
            .with_shutdown_grace(Duration::from_secs(self.shutdown_grace_secs))
            .with_receive_wait(Duration::from_millis(self.receive_wait_ms))
            .with_max_deliveries(self.max_deliveries)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_concurrency == 0 {
            issues.push(ConfigIssue::out_of_range(
                "worker.max_concurrency",
                "must be at least 1",
            ));
        }
        if self.ack_deadline_secs == 0 {
            issues.push(ConfigIssue::out_of_range(
                "worker.ack_deadline_secs",
                "must be at least 1",
            ));
        }
        if self.extend_margin_secs >= self.ack_deadline_secs {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                code: ConfigIssueCode::ExtendMarginTooLarge,
                message: format!(
                    "worker.extend_margin_secs ({}) must be smaller than worker.ack_deadline_secs ({})",
                    self.extend_margin_secs, self.ack_deadline_secs
                ),
            });
        }
        if self.max_deliveries == 0 {
            issues.push(ConfigIssue::out_of_range(
                "worker.max_deliveries",
                "must be at least 1",
            ));
        }
        issues
    }
}

/// Raw pipeline configuration from TOML
///
/// # Example
///
/// ```toml
/// [pipeline]
/// step_timeout_secs = 300
/// job_timeout_secs = 540       # must not exceed worker.ack_deadline_secs
/// max_step_attempts = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePipelineConfig {
    pub step_timeout_secs: u64,
    pub job_timeout_secs: u64,
    pub max_step_attempts: u32,
}

impl Default for FilePipelineConfig {
    fn default() -> Self {
        let defaults = PipelineParams::default();
        Self {
            step_timeout_secs: defaults.step_timeout.as_secs(),
            job_timeout_secs: defaults.job_timeout.as_secs(),
            max_step_attempts: defaults.max_step_attempts,
        }
    }
}

impl FilePipelineConfig {
    pub fn to_params(&self) -> PipelineParams {
        PipelineParams::default()
            .with_step_timeout(Duration::from_secs(self.step_timeout_secs))
            .with_job_timeout(Duration::from_secs(self.job_timeout_secs))
            .with_max_step_attempts(self.max_step_attempts)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.step_timeout_secs == 0 {
            issues.push(ConfigIssue::out_of_range(
                "pipeline.step_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.job_timeout_secs == 0 {
            issues.push(ConfigIssue::out_of_range(
                "pipeline.job_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.max_step_attempts == 0 {
            issues.push(ConfigIssue {
                severity: Severity::Warning,
                code: ConfigIssueCode::OutOfRange {
                    field: "pipeline.max_step_attempts".to_string(),
                },
                message: "pipeline.max_step_attempts: 0 is treated as 1".to_string(),
            });
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_application_defaults() {
        assert_eq!(FileWorkerConfig::default().to_params(), WorkerParams::default());
        assert_eq!(
            FilePipelineConfig::default().to_params(),
            PipelineParams::default()
        );
    }

    #[test]
    fn test_extend_margin_must_fit_deadline() {
        let config = FileWorkerConfig {
            ack_deadline_secs: 30,
            extend_margin_secs: 30,
            ..Default::default()
        };
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::ExtendMarginTooLarge);
    }

    #[test]
    fn test_zero_concurrency_is_error() {
        let config = FileWorkerConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(council_domain::has_errors(&config.validate()));
    }
}
