//! Pipeline parameters: step and job budgets, review behaviour.

use council_domain::{DEFAULT_MAX_DIFF_LINES, DEFAULT_RERUN_THRESHOLD, DropPolicy};
use std::time::Duration;

/// Step and job timeouts for [`PipelineExecutor`](crate::use_cases::pipeline_executor::PipelineExecutor).
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParams {
    /// Hard timeout of a single step attempt
    pub step_timeout: Duration,
    /// Wall-clock budget of a whole run, checked between steps
    pub job_timeout: Duration,
    /// Attempts per step on retryable failure before giving up to the worker
    pub max_step_attempts: u32,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(300),
            job_timeout: Duration::from_secs(540),
            max_step_attempts: 3,
        }
    }
}

impl PipelineParams {
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_max_step_attempts(mut self, attempts: u32) -> Self {
        self.max_step_attempts = attempts.max(1);
        self
    }
}

/// How the review step calls the roster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewParams {
    /// Review personas concurrently instead of one by one in roster order
    pub concurrent: bool,
    pub drop_policy: DropPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionParams {
    pub rerun_threshold: f64,
}

impl Default for RevisionParams {
    fn default() -> Self {
        Self {
            rerun_threshold: DEFAULT_RERUN_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffParams {
    pub max_lines_per_field: usize,
}

impl Default for DiffParams {
    fn default() -> Self {
        Self {
            max_lines_per_field: DEFAULT_MAX_DIFF_LINES,
        }
    }
}
