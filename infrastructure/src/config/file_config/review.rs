//! Review, retry, revision and diff settings from TOML

use council_application::config::{DiffParams, RetryPolicy, ReviewParams, RevisionParams};
use council_domain::DropPolicy;
use council_domain::config::validation::ConfigIssue;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-persona retry settings (`[retry]`)
///
/// # Example
///
/// ```toml
/// [retry]
/// max_retries_per_persona = 3
/// initial_backoff_ms = 1000
/// multiplier = 2.0
/// max_backoff_ms = 30000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRetryConfig {
    pub max_retries_per_persona: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for FileRetryConfig {
    fn default() -> Self {
        let defaults = RetryPolicy::default();
        Self {
            max_retries_per_persona: defaults.max_retries,
            initial_backoff_ms: defaults.initial_backoff.as_millis() as u64,
            multiplier: defaults.multiplier,
            max_backoff_ms: defaults.max_backoff.as_millis() as u64,
        }
    }
}

impl FileRetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries_per_persona,
            Duration::from_millis(self.initial_backoff_ms),
            self.multiplier,
        )
        .with_max_backoff(Duration::from_millis(self.max_backoff_ms))
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            issues.push(ConfigIssue::out_of_range(
                "retry.multiplier",
                format!("must be at least 1.0, got {}", self.multiplier),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            issues.push(ConfigIssue::out_of_range(
                "retry.max_backoff_ms",
                "must not be smaller than retry.initial_backoff_ms",
            ));
        }
        issues
    }
}

/// Review step settings (`[review]`)
///
/// ```toml
/// [review]
/// concurrent = false
/// drop_policy = "renormalize"   # or "zero_confidence"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReviewConfig {
    pub concurrent: bool,
    pub drop_policy: String,
}

impl Default for FileReviewConfig {
    fn default() -> Self {
        Self {
            concurrent: false,
            drop_policy: DropPolicy::default().as_str().to_string(),
        }
    }
}

impl FileReviewConfig {
    /// Parse the drop policy, falling back to the default on error.
    pub fn parse_drop_policy(&self) -> (DropPolicy, Vec<ConfigIssue>) {
        match self.drop_policy.parse::<DropPolicy>() {
            Ok(policy) => (policy, vec![]),
            Err(_) => (
                DropPolicy::default(),
                vec![ConfigIssue::invalid_enum(
                    "review.drop_policy",
                    &self.drop_policy,
                    &["renormalize", "zero_confidence"],
                )],
            ),
        }
    }

    pub fn to_params(&self) -> ReviewParams {
        ReviewParams {
            concurrent: self.concurrent,
            drop_policy: self.parse_drop_policy().0,
        }
    }
}

/// Revision settings (`[revision]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRevisionConfig {
    /// Parent confidence below which a persona is rerun
    pub rerun_threshold: f64,
}

impl Default for FileRevisionConfig {
    fn default() -> Self {
        Self {
            rerun_threshold: RevisionParams::default().rerun_threshold,
        }
    }
}

impl FileRevisionConfig {
    pub fn to_params(&self) -> RevisionParams {
        RevisionParams {
            rerun_threshold: self.rerun_threshold,
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        if (0.0..=1.0).contains(&self.rerun_threshold) {
            vec![]
        } else {
            vec![ConfigIssue::out_of_range(
                "revision.rerun_threshold",
                format!("must be within [0, 1], got {}", self.rerun_threshold),
            )]
        }
    }
}

/// Diff settings (`[diff]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDiffConfig {
    pub max_lines_per_field: usize,
}

impl Default for FileDiffConfig {
    fn default() -> Self {
        Self {
            max_lines_per_field: DiffParams::default().max_lines_per_field,
        }
    }
}

impl FileDiffConfig {
    pub fn to_params(&self) -> DiffParams {
        DiffParams {
            max_lines_per_field: self.max_lines_per_field,
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        if self.max_lines_per_field == 0 {
            vec![ConfigIssue::out_of_range(
                "diff.max_lines_per_field",
                "must be at least 1",
            )]
        } else {
            vec![]
        }
    }
}
