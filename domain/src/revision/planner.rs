use crate::persona::{PersonaId, PersonaRoster, PersonaSpec};
use crate::review::PersonaReview;
use crate::run::proposal::Proposal;
use serde::{Deserialize, Serialize};

/// Parent confidence strictly below which a persona is rerun.
pub const DEFAULT_RERUN_THRESHOLD: f64 = 0.70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunReason {
    LowConfidence,
    BlockingIssues,
    SecurityConcerns,
    MissingParentReview,
}

/// Which personas to rerun and which parent reviews to carry over.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionPlan {
    /// Personas to review again, in roster order
    pub rerun: Vec<PersonaId>,
    /// Why each rerun persona was selected
    pub reasons: Vec<(PersonaId, Vec<RerunReason>)>,
    /// Parent reviews to copy unchanged, in roster order
    pub reuse: Vec<PersonaReview>,
    /// The proposal the rerun personas will review
    pub proposal: Proposal,
}

impl RevisionPlan {
    pub fn is_full_rerun(&self) -> bool {
        self.reuse.is_empty()
    }

    pub fn reasons_for(&self, persona: PersonaId) -> &[RerunReason] {
        self.reasons
            .iter()
            .find(|(p, _)| *p == persona)
            .map(|(_, reasons)| reasons.as_slice())
            .unwrap_or(&[])
    }
}

/// Pure planner. The threshold is fixed per deployment, not per call.
#[derive(Debug, Clone)]
pub struct RevisionPlanner {
    roster: PersonaRoster,
    rerun_threshold: f64,
}

impl RevisionPlanner {
    pub fn new(roster: PersonaRoster) -> Self {
        Self {
            roster,
            rerun_threshold: DEFAULT_RERUN_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, rerun_threshold: f64) -> Self {
        self.rerun_threshold = rerun_threshold;
        self
    }

    pub fn rerun_threshold(&self) -> f64 {
        self.rerun_threshold
    }

    /// Split the roster into rerun and reuse sets based on the parent reviews.
    ///
    /// Callers must have already checked that the revision carries edits.
    pub fn plan(&self, parent_reviews: &[PersonaReview], edited_proposal: &Proposal) -> RevisionPlan {
        let mut rerun = Vec::new();
        let mut reasons = Vec::new();
        let mut reuse = Vec::new();

        for spec in self.roster.specs() {
            let parent = parent_reviews.iter().find(|r| r.persona == spec.id);
            let persona_reasons = match parent {
                Some(review) => self.rerun_reasons(spec, review),
                None => vec![RerunReason::MissingParentReview],
            };

            match parent {
                Some(review) if persona_reasons.is_empty() => reuse.push(review.clone()),
                _ => {
                    rerun.push(spec.id);
                    reasons.push((spec.id, persona_reasons));
                }
            }
        }

        RevisionPlan {
            rerun,
            reasons,
            reuse,
            proposal: edited_proposal.clone(),
        }
    }

    fn rerun_reasons(&self, spec: &PersonaSpec, review: &PersonaReview) -> Vec<RerunReason> {
        let mut reasons = Vec::new();
        if review.confidence() < self.rerun_threshold {
            reasons.push(RerunReason::LowConfidence);
        }
        if review.has_blocking_issues() {
            reasons.push(RerunReason::BlockingIssues);
        }
        if spec.veto_capable
            && (!review.content.concerns.is_empty() || review.has_security_critical_issue())
        {
            reasons.push(RerunReason::SecurityConcerns);
        }
        reasons
    }
}
