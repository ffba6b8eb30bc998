//! Table set shared by the in-memory and JSON-file repositories

use council_application::{InsertOutcome, RepositoryError};
use council_domain::{Decision, PersonaReview, ProposalVersion, Run, RunId, StepProgress};
use serde::{Deserialize, Serialize};

pub(crate) const STORE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DecisionRow {
    pub run_id: RunId,
    pub decision: Decision,
}

/// Every table of the run store, with the uniqueness rules applied on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RunTables {
    pub version: u32,
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub proposals: Vec<ProposalVersion>,
    #[serde(default)]
    pub reviews: Vec<PersonaReview>,
    #[serde(default)]
    pub decisions: Vec<DecisionRow>,
    #[serde(default)]
    pub steps: Vec<StepProgress>,
}

impl Default for RunTables {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            runs: Vec::new(),
            proposals: Vec::new(),
            reviews: Vec::new(),
            decisions: Vec::new(),
            steps: Vec::new(),
        }
    }
}

impl RunTables {
    pub fn create_run(&mut self, run: &Run) -> Result<(), RepositoryError> {
        if self.runs.iter().any(|r| r.id == run.id) {
            return Err(RepositoryError::Duplicate(format!("run {}", run.id)));
        }
        self.runs.push(run.clone());
        Ok(())
    }

    pub fn get_run(&self, id: RunId) -> Option<Run> {
        self.runs.iter().find(|r| r.id == id).cloned()
    }

    pub fn update_run(&mut self, run: &Run) -> Result<(), RepositoryError> {
        let stored = self
            .runs
            .iter_mut()
            .find(|r| r.id == run.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("run {}", run.id)))?;
        if !stored.status.admits_update_to(run.status) {
            return Err(RepositoryError::Conflict(format!(
                "run {} is {}, refusing {}",
                run.id, stored.status, run.status
            )));
        }
        *stored = run.clone();
        Ok(())
    }

    pub fn save_proposal(&mut self, proposal: &ProposalVersion) -> Result<InsertOutcome, RepositoryError> {
        self.require_run(proposal.run_id)?;
        if self.proposals.iter().any(|p| p.run_id == proposal.run_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        self.proposals.push(proposal.clone());
        Ok(InsertOutcome::Inserted)
    }

    pub fn get_proposal(&self, run_id: RunId) -> Option<ProposalVersion> {
        self.proposals.iter().find(|p| p.run_id == run_id).cloned()
    }

    pub fn insert_review(&mut self, review: &PersonaReview) -> Result<InsertOutcome, RepositoryError> {
        self.require_run(review.run_id)?;
        if self
            .reviews
            .iter()
            .any(|r| r.run_id == review.run_id && r.persona == review.persona)
        {
            return Ok(InsertOutcome::AlreadyExists);
        }
        self.reviews.push(review.clone());
        Ok(InsertOutcome::Inserted)
    }

    pub fn list_reviews(&self, run_id: RunId) -> Vec<PersonaReview> {
        self.reviews
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }

    pub fn save_decision(&mut self, run_id: RunId, decision: &Decision) -> Result<InsertOutcome, RepositoryError> {
        self.require_run(run_id)?;
        if self.decisions.iter().any(|d| d.run_id == run_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        self.decisions.push(DecisionRow {
            run_id,
            decision: decision.clone(),
        });
        Ok(InsertOutcome::Inserted)
    }

    pub fn get_decision(&self, run_id: RunId) -> Option<Decision> {
        self.decisions
            .iter()
            .find(|d| d.run_id == run_id)
            .map(|d| d.decision.clone())
    }

    pub fn upsert_step(&mut self, progress: &StepProgress) -> Result<(), RepositoryError> {
        self.require_run(progress.run_id)?;
        match self
            .steps
            .iter_mut()
            .find(|s| s.run_id == progress.run_id && s.step == progress.step)
        {
            Some(row) => *row = progress.clone(),
            None => self.steps.push(progress.clone()),
        }
        Ok(())
    }

    pub fn list_steps(&self, run_id: RunId) -> Vec<StepProgress> {
        let mut steps: Vec<StepProgress> = self
            .steps
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step);
        steps
    }

    pub fn list_runs(&self) -> Vec<Run> {
        let mut runs = self.runs.clone();
        runs.sort_by_key(|r| r.created_at);
        runs
    }

    /// Child rows reference an existing run.
    fn require_run(&self, run_id: RunId) -> Result<(), RepositoryError> {
        if self.runs.iter().any(|r| r.id == run_id) {
            Ok(())
        } else {
            Err(RepositoryError::Constraint(format!(
                "run {} does not exist",
                run_id
            )))
        }
    }
}
