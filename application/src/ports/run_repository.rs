//! Run repository port
//!
//! Typed persistence for runs and everything a run produces. Stores enforce
//! uniqueness on `run_id` for proposals and decisions and on
//! `(run_id, persona)` for reviews: a second insert is a no-op reported as
//! [`InsertOutcome::AlreadyExists`], never an overwrite.

use async_trait::async_trait;
use council_domain::{
    Decision, ErrorClass, PersonaReview, ProposalVersion, Run, RunAggregate, RunId, StepProgress,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The stored run has moved on; the write was made from a stale copy
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RepositoryError::Storage(_) => ErrorClass::Retryable,
            RepositoryError::NotFound(_)
            | RepositoryError::Duplicate(_)
            | RepositoryError::Constraint(_)
            | RepositoryError::Conflict(_) => ErrorClass::Fatal,
        }
    }
}

/// Result of an insert under a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert a new run. [`RepositoryError::Duplicate`] if the id exists.
    async fn create_run(&self, run: &Run) -> Result<(), RepositoryError>;

    async fn get_run(&self, id: RunId) -> Result<Option<Run>, RepositoryError>;

    /// Replace a stored run. [`RepositoryError::NotFound`] if absent,
    /// [`RepositoryError::Conflict`] if the stored status does not admit the
    /// new one (see [`RunStatus::admits_update_to`]).
    ///
    /// [`RunStatus::admits_update_to`]: council_domain::RunStatus::admits_update_to
    async fn update_run(&self, run: &Run) -> Result<(), RepositoryError>;

    async fn save_proposal(&self, proposal: &ProposalVersion)
    -> Result<InsertOutcome, RepositoryError>;

    async fn get_proposal(&self, run_id: RunId) -> Result<Option<ProposalVersion>, RepositoryError>;

    async fn insert_review(&self, review: &PersonaReview) -> Result<InsertOutcome, RepositoryError>;

    /// Reviews of a run, in insertion order.
    async fn list_reviews(&self, run_id: RunId) -> Result<Vec<PersonaReview>, RepositoryError>;

    async fn save_decision(
        &self,
        run_id: RunId,
        decision: &Decision,
    ) -> Result<InsertOutcome, RepositoryError>;

    async fn get_decision(&self, run_id: RunId) -> Result<Option<Decision>, RepositoryError>;

    /// Insert or replace the progress row for `(run_id, step)`.
    async fn upsert_step(&self, progress: &StepProgress) -> Result<(), RepositoryError>;

    /// Progress rows of a run, in pipeline order.
    async fn list_steps(&self, run_id: RunId) -> Result<Vec<StepProgress>, RepositoryError>;

    /// All runs, oldest first.
    async fn list_runs(&self) -> Result<Vec<Run>, RepositoryError>;

    /// Load a run with its proposal, reviews, decision and step progress.
    async fn load_aggregate(&self, run_id: RunId) -> Result<Option<RunAggregate>, RepositoryError> {
        let Some(run) = self.get_run(run_id).await? else {
            return Ok(None);
        };
        let mut aggregate = RunAggregate::new(run);
        aggregate.proposal = self.get_proposal(run_id).await?;
        aggregate.reviews = self.list_reviews(run_id).await?;
        aggregate.decision = self.get_decision(run_id).await?;
        aggregate.steps = self.list_steps(run_id).await?;
        Ok(Some(aggregate))
    }
}
