//! In-memory run repository

use super::tables::RunTables;
use async_trait::async_trait;
use council_application::{InsertOutcome, RepositoryError, RunRepository};
use council_domain::{Decision, PersonaReview, ProposalVersion, Run, RunId, StepProgress};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Process-local [`RunRepository`]; everything is lost on exit.
#[derive(Default)]
pub struct InMemoryRunRepository {
    tables: RwLock<RunTables>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RunTables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::Storage("run tables lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RunTables>, RepositoryError> {
        self.tables
            .write()
            .map_err(|_| RepositoryError::Storage("run tables lock poisoned".to_string()))
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn create_run(&self, run: &Run) -> Result<(), RepositoryError> {
        self.write()?.create_run(run)
    }

    async fn get_run(&self, id: RunId) -> Result<Option<Run>, RepositoryError> {
        Ok(self.read()?.get_run(id))
    }

    async fn update_run(&self, run: &Run) -> Result<(), RepositoryError> {
        self.write()?.update_run(run)
    }

    async fn save_proposal(
        &self,
        proposal: &ProposalVersion,
    ) -> Result<InsertOutcome, RepositoryError> {
        self.write()?.save_proposal(proposal)
    }

    async fn get_proposal(&self, run_id: RunId) -> Result<Option<ProposalVersion>, RepositoryError> {
        Ok(self.read()?.get_proposal(run_id))
    }

    async fn insert_review(&self, review: &PersonaReview) -> Result<InsertOutcome, RepositoryError> {
        self.write()?.insert_review(review)
    }

    async fn list_reviews(&self, run_id: RunId) -> Result<Vec<PersonaReview>, RepositoryError> {
        Ok(self.read()?.list_reviews(run_id))
    }

    async fn save_decision(
        &self,
        run_id: RunId,
        decision: &Decision,
    ) -> Result<InsertOutcome, RepositoryError> {
        self.write()?.save_decision(run_id, decision)
    }

    async fn get_decision(&self, run_id: RunId) -> Result<Option<Decision>, RepositoryError> {
        Ok(self.read()?.get_decision(run_id))
    }

    async fn upsert_step(&self, progress: &StepProgress) -> Result<(), RepositoryError> {
        self.write()?.upsert_step(progress)
    }

    async fn list_steps(&self, run_id: RunId) -> Result<Vec<StepProgress>, RepositoryError> {
        Ok(self.read()?.list_steps(run_id))
    }

    async fn list_runs(&self) -> Result<Vec<Run>, RepositoryError> {
        Ok(self.read()?.list_runs())
    }
}
