//! Compare Runs use case

use crate::config::DiffParams;
use crate::ports::run_repository::{RepositoryError, RunRepository};
use council_domain::{DiffEngine, RunDiff, RunId, RunStatus};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CompareRunsError {
    #[error("Cannot compare a run with itself: {0}")]
    SameRun(RunId),

    #[error("Run not found: {0}")]
    NotFound(RunId),

    #[error("Run {id} is {status}, only completed runs can be compared")]
    NotCompleted { id: RunId, status: RunStatus },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct CompareRunsUseCase {
    repository: Arc<dyn RunRepository>,
    engine: DiffEngine,
}

impl CompareRunsUseCase {
    pub fn new(repository: Arc<dyn RunRepository>, params: &DiffParams) -> Self {
        Self {
            repository,
            engine: DiffEngine::new(params.max_lines_per_field),
        }
    }

    /// Diff run `a` (old side) against run `b` (new side).
    pub async fn execute(&self, a: RunId, b: RunId) -> Result<RunDiff, CompareRunsError> {
        if a == b {
            return Err(CompareRunsError::SameRun(a));
        }

        let mut aggregates = Vec::with_capacity(2);
        for id in [a, b] {
            let aggregate = self
                .repository
                .load_aggregate(id)
                .await?
                .ok_or(CompareRunsError::NotFound(id))?;
            if aggregate.run.status != RunStatus::Completed {
                return Err(CompareRunsError::NotCompleted {
                    id,
                    status: aggregate.run.status,
                });
            }
            aggregates.push(aggregate);
        }

        let diff = self.engine.diff(&aggregates[0], &aggregates[1]);
        debug!(
            run_a = %a,
            run_b = %b,
            changed_fields = diff.changed_fields().len(),
            "Runs compared"
        );
        Ok(diff)
    }
}
