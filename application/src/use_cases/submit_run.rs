//! Submit Run use case
//!
//! Creates a queued initial run and publishes its job message.

use crate::ports::job_queue::{JobQueue, QueueError};
use crate::ports::run_repository::{RepositoryError, RunRepository};
use crate::ports::version_provider::VersionProvider;
use chrono::Utc;
use council_domain::{
    ErrorClass, JobMessage, JobPayload, JobPriority, ModelParams, Run, RunFailure, RunInput,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SubmitRunError {
    #[error("Idea must not be empty")]
    EmptyIdea,

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Input for the SubmitRun use case
#[derive(Debug, Clone)]
pub struct SubmitRunInput {
    pub idea: String,
    pub extra_context: serde_json::Map<String, serde_json::Value>,
    pub priority: JobPriority,
    /// Overrides the configured model parameters for this run
    pub params: Option<ModelParams>,
}

impl SubmitRunInput {
    pub fn new(idea: impl Into<String>) -> Self {
        Self {
            idea: idea.into(),
            extra_context: serde_json::Map::new(),
            priority: JobPriority::Normal,
            params: None,
        }
    }

    pub fn with_extra_context(mut self, context: serde_json::Map<String, serde_json::Value>) -> Self {
        self.extra_context = context;
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = Some(params);
        self
    }
}

pub struct SubmitRunUseCase {
    repository: Arc<dyn RunRepository>,
    queue: Arc<dyn JobQueue>,
    versions: Arc<dyn VersionProvider>,
    params: ModelParams,
}

impl SubmitRunUseCase {
    pub fn new(
        repository: Arc<dyn RunRepository>,
        queue: Arc<dyn JobQueue>,
        versions: Arc<dyn VersionProvider>,
        params: ModelParams,
    ) -> Self {
        Self {
            repository,
            queue,
            versions,
            params,
        }
    }

    /// Persist the run, then enqueue it.
    ///
    /// If the enqueue fails the run is marked failed so it does not sit in
    /// `queued` forever.
    pub async fn execute(&self, input: SubmitRunInput) -> Result<Run, SubmitRunError> {
        let idea = input.idea.trim();
        if idea.is_empty() {
            return Err(SubmitRunError::EmptyIdea);
        }

        let run_input = RunInput::idea(idea).with_extra_context(input.extra_context.clone());
        let mut run = Run::new_initial(
            run_input,
            input.params.unwrap_or_else(|| self.params.clone()),
            self.versions.versions(),
            Utc::now(),
        );
        self.repository.create_run(&run).await?;

        let message = JobMessage::new(
            run.id,
            run.kind,
            JobPayload {
                idea: run.input.idea.clone(),
                extra_context: run.input.extra_context.clone(),
            },
        )
        .with_priority(input.priority);

        if let Err(e) = self.queue.enqueue(&message).await {
            warn!(run_id = %run.id, error = %e, "Enqueue failed, marking run failed");
            let failure = RunFailure::new(ErrorClass::Fatal, None, format!("enqueue failed: {}", e));
            if run.mark_failed(failure, Utc::now()).is_ok() {
                self.repository.update_run(&run).await?;
            }
            return Err(e.into());
        }

        info!(
            run_id = %run.id,
            priority = input.priority.as_str(),
            prompt_set = %run.versions.prompt_set,
            "Run submitted"
        );
        Ok(run)
    }
}
