//! Council configuration container.
//!
//! [`CouncilConfig`] groups the configuration slices the use cases need.
//! Use cases receive only the slices they use; the binary holds the whole
//! container and wires it in.
//!
//! | Slice | Used by |
//! |-------|---------|
//! | [`WorkerParams`] | JobWorker |
//! | [`PipelineParams`] | PipelineExecutor |
//! | [`RetryPolicy`] | PersonaReviewer |
//! | [`ReviewParams`] | ReviewOrchestrator, DecisionAggregator |
//! | [`RevisionParams`] | RevisionPlanner |
//! | [`DiffParams`] | CompareRuns |
//! | `PersonaRoster` | ReviewOrchestrator, DecisionAggregator, RevisionPlanner |
//! | `ModelParams` | SubmitRun, CreateRevision |
//! | `VersionTags` | SubmitRun, CreateRevision |

use crate::config::{
    DiffParams, PipelineParams, RetryPolicy, ReviewParams, RevisionParams, WorkerParams,
};
use council_domain::{ConfigIssue, ModelParams, PersonaRoster, VersionTags};

#[derive(Debug, Clone, Default)]
pub struct CouncilConfig {
    pub worker: WorkerParams,
    pub pipeline: PipelineParams,
    pub retry: RetryPolicy,
    pub review: ReviewParams,
    pub revision: RevisionParams,
    pub diff: DiffParams,
    pub roster: PersonaRoster,
    pub model: ModelParams,
    pub versions: VersionTags,
}

impl CouncilConfig {
    /// Check invariants that span slices.
    ///
    /// The job timeout must not exceed the ack deadline, otherwise a slow
    /// job and its own redelivery can run the same run concurrently.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.pipeline.job_timeout > self.worker.ack_deadline {
            issues.push(ConfigIssue::job_timeout_exceeds_ack_deadline(
                self.pipeline.job_timeout.as_secs(),
                self.worker.ack_deadline.as_secs(),
            ));
        }
        if self.worker.max_concurrency == 0 {
            issues.push(ConfigIssue::out_of_range(
                "worker.max_concurrency",
                "must be at least 1",
            ));
        }
        if self.pipeline.step_timeout > self.pipeline.job_timeout {
            issues.push(ConfigIssue::out_of_range(
                "pipeline.step_timeout_secs",
                "must not exceed pipeline.job_timeout_secs",
            ));
        }

        issues
    }
}
