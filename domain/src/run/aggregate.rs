//! Fully loaded run: the unit read by diffs and status views

use crate::consensus::Decision;
use crate::persona::PersonaId;
use crate::review::PersonaReview;
use crate::run::entities::Run;
use crate::run::proposal::ProposalVersion;
use crate::run::step::{StepName, StepProgress};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAggregate {
    pub run: Run,
    pub proposal: Option<ProposalVersion>,
    pub reviews: Vec<PersonaReview>,
    pub decision: Option<Decision>,
    pub steps: Vec<StepProgress>,
}

impl RunAggregate {
    pub fn new(run: Run) -> Self {
        Self {
            run,
            proposal: None,
            reviews: Vec::new(),
            decision: None,
            steps: Vec::new(),
        }
    }

    pub fn review_for(&self, persona: PersonaId) -> Option<&PersonaReview> {
        self.reviews.iter().find(|r| r.persona == persona)
    }

    /// The last step in pipeline order that completed.
    pub fn last_completed_step(&self) -> Option<StepName> {
        self.steps
            .iter()
            .filter(|s| s.is_completed())
            .map(|s| s.step)
            .max()
    }
}
