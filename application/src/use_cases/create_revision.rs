//! Create Revision use case
//!
//! Creates a queued revision of a completed run. The revision inherits the
//! parent's idea and context; the pipeline later builds its proposal from
//! the edits and reuses the parent reviews the planner allows.

use crate::ports::job_queue::{JobQueue, QueueError};
use crate::ports::run_repository::{RepositoryError, RunRepository};
use crate::ports::version_provider::VersionProvider;
use chrono::Utc;
use council_domain::{
    DomainError, ErrorClass, JobMessage, JobPayload, JobPriority, ModelParams, Proposal, Run,
    RunFailure, RunId, RunInput, RunStatus,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RevisionError {
    #[error("A revision needs an edited proposal or edit notes")]
    NoEdits,

    #[error("Parent run not found: {0}")]
    ParentNotFound(RunId),

    #[error("Parent run {id} is {status}, only completed runs can be revised")]
    ParentNotCompleted { id: RunId, status: RunStatus },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Input for the CreateRevision use case
#[derive(Debug, Clone)]
pub struct CreateRevisionInput {
    pub parent_run_id: RunId,
    pub edited_proposal: Option<Proposal>,
    pub edit_notes: Option<String>,
    pub priority: JobPriority,
}

impl CreateRevisionInput {
    pub fn new(parent_run_id: RunId) -> Self {
        Self {
            parent_run_id,
            edited_proposal: None,
            edit_notes: None,
            priority: JobPriority::Normal,
        }
    }

    pub fn with_proposal(mut self, proposal: Proposal) -> Self {
        self.edited_proposal = Some(proposal);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.edit_notes = Some(notes.into());
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }
}

pub struct CreateRevisionUseCase {
    repository: Arc<dyn RunRepository>,
    queue: Arc<dyn JobQueue>,
    versions: Arc<dyn VersionProvider>,
    params: ModelParams,
}

impl CreateRevisionUseCase {
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

    pub async fn execute(&self, input: CreateRevisionInput) -> Result<Run, RevisionError> {
        let notes = input
            .edit_notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if input.edited_proposal.is_none() && notes.is_none() {
            return Err(RevisionError::NoEdits);
        }

        let parent = self
            .repository
            .get_run(input.parent_run_id)
            .await?
            .ok_or(RevisionError::ParentNotFound(input.parent_run_id))?;
        if parent.status != RunStatus::Completed {
            return Err(RevisionError::ParentNotCompleted {
                id: parent.id,
                status: parent.status,
            });
        }

        let run_input = RunInput {
            idea: parent.input.idea.clone(),
            extra_context: parent.input.extra_context.clone(),
            edited_proposal: input.edited_proposal,
            edit_notes: notes,
        };
        let mut run = Run::new_revision(
            &parent,
            run_input,
            self.params.clone(),
            self.versions.versions(),
            Utc::now(),
        )?;
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
            warn!(run_id = %run.id, error = %e, "Enqueue failed, marking revision failed");
            let failure = RunFailure::new(ErrorClass::Fatal, None, format!("enqueue failed: {}", e));
            if run.mark_failed(failure, Utc::now()).is_ok() {
                self.repository.update_run(&run).await?;
            }
            return Err(e.into());
        }

        info!(
            run_id = %run.id,
            parent = %parent.id,
            edited = run.input.edited_proposal.is_some(),
            "Revision submitted"
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::version_provider::StaticVersions;
    use crate::testing::{MemoryRepository, RecordingQueue, sample_proposal};
    use council_domain::{RunKind, VersionTags};

    struct Fixture {
        repository: Arc<MemoryRepository>,
        queue: Arc<RecordingQueue>,
        use_case: CreateRevisionUseCase,
    }

    fn fixture() -> Fixture {
        let repository = Arc::new(MemoryRepository::new());
        let queue = Arc::new(RecordingQueue::new());
        let use_case = CreateRevisionUseCase::new(
            repository.clone(),
            queue.clone(),
            Arc::new(StaticVersions(VersionTags::default())),
            ModelParams::default(),
        );
        Fixture {
            repository,
            queue,
            use_case,
        }
    }

    async fn parent(repository: &MemoryRepository, complete: bool) -> Run {
        let mut context = serde_json::Map::new();
        context.insert("team".to_string(), serde_json::json!("mobile"));
        let mut run = Run::new_initial(
            RunInput::idea("Offline mode").with_extra_context(context),
            ModelParams::default(),
            VersionTags::default(),
            Utc::now(),
        );
        if complete {
            run.mark_running(Utc::now()).unwrap();
            run.mark_completed(Utc::now()).unwrap();
        }
        repository.create_run(&run).await.unwrap();
        run
    }

    #[tokio::test]
    async fn test_revision_from_notes() {
        let f = fixture();
        let parent = parent(&f.repository, true).await;

        let run = f
            .use_case
            .execute(CreateRevisionInput::new(parent.id).with_notes("Add conflict policy"))
            .await
            .unwrap();

        assert_eq!(run.kind, RunKind::Revision);
        assert_eq!(run.parent_run_id, Some(parent.id));
        assert_eq!(run.input.idea, "Offline mode");
        assert_eq!(run.input.extra_context["team"], "mobile");
        assert_eq!(run.input.edit_notes.as_deref(), Some("Add conflict policy"));

        let enqueued = f.queue.enqueued();
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].run_type, RunKind::Revision);
    }

    #[tokio::test]
    async fn test_revision_with_edited_proposal() {
        let f = fixture();
        let parent = parent(&f.repository, true).await;
        let run = f
            .use_case
            .execute(CreateRevisionInput::new(parent.id).with_proposal(sample_proposal()))
            .await
            .unwrap();
        assert_eq!(run.input.edited_proposal, Some(sample_proposal()));
        assert!(run.input.edit_notes.is_none());
    }

    #[tokio::test]
    async fn test_requires_edits() {
        let f = fixture();
        let parent = parent(&f.repository, true).await;
        let result = f
            .use_case
            .execute(CreateRevisionInput::new(parent.id).with_notes("  "))
            .await;
        assert!(matches!(result, Err(RevisionError::NoEdits)));
        assert!(f.queue.enqueued().is_empty());
    }

    #[tokio::test]
    async fn test_parent_must_exist() {
        let f = fixture();
        let missing = RunId::new();
        let result = f
            .use_case
            .execute(CreateRevisionInput::new(missing).with_notes("x"))
            .await;
        assert!(matches!(result, Err(RevisionError::ParentNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_parent_must_be_completed() {
        let f = fixture();
        let parent = parent(&f.repository, false).await;
        let result = f
            .use_case
            .execute(CreateRevisionInput::new(parent.id).with_notes("x"))
            .await;
        assert!(matches!(
            result,
            Err(RevisionError::ParentNotCompleted {
                status: RunStatus::Queued,
                ..
            })
        ));
        assert_eq!(f.repository.list_runs().await.unwrap().len(), 1);
    }
}
