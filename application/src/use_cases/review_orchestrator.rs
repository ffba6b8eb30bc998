//! Review orchestrator
//!
//! Runs a set of personas against one proposal. Every persona sees only the
//! proposal, never another persona's output. Sequential mode walks the
//! personas in the given order; concurrent mode issues all calls at once and
//! still returns results in that order.
//!
//! Each review is stored the moment its persona finishes, so a pass cut short
//! by a timeout or a cancellation keeps the reviews it already paid for.

use crate::ports::progress::PipelineProgress;
use crate::ports::reviewer_client::ReviewerError;
use crate::ports::run_repository::{InsertOutcome, RepositoryError, RunRepository};
use crate::use_cases::persona_reviewer::{PersonaOutcome, PersonaReviewer, ReviewContext};
use council_domain::{DroppedPersona, PersonaId, PersonaReview, PersonaSpec};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReviewPassError {
    #[error(transparent)]
    Reviewer(#[from] ReviewerError),

    #[error("Storing review failed: {0}")]
    Store(#[from] RepositoryError),
}

/// Execution summary of one review pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewMetadata {
    pub requested: usize,
    pub reviewed: usize,
    pub dropped: usize,
    pub total_retries: u32,
    pub concurrent: bool,
}

/// Reviews and drops of one pass, both in persona order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewBatch {
    pub reviews: Vec<PersonaReview>,
    pub dropped: Vec<DroppedPersona>,
    pub metadata: ReviewMetadata,
}

impl ReviewBatch {
    pub fn dropped_ids(&self) -> Vec<PersonaId> {
        self.dropped.iter().map(|d| d.persona).collect()
    }
}

pub struct ReviewOrchestrator {
    reviewer: PersonaReviewer,
    concurrent: bool,
}

impl ReviewOrchestrator {
    pub fn new(reviewer: PersonaReviewer, concurrent: bool) -> Self {
        Self {
            reviewer,
            concurrent,
        }
    }

    /// Review `ctx.proposal` with each persona in `personas`, storing every
    /// review in `store` as soon as it is produced.
    ///
    /// Fails only on a fatal reviewer error or a store failure; transient and
    /// schema failures become dropped personas.
    pub async fn review(
        &self,
        personas: &[PersonaSpec],
        ctx: ReviewContext<'_>,
        progress: &dyn PipelineProgress,
        store: &dyn RunRepository,
    ) -> Result<ReviewBatch, ReviewPassError> {
        let outcomes = if self.concurrent {
            join_all(
                personas
                    .iter()
                    .map(|spec| self.review_one(spec, ctx, progress, store)),
            )
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut outcomes = Vec::with_capacity(personas.len());
            for spec in personas {
                outcomes.push(self.review_one(spec, ctx, progress, store).await?);
            }
            outcomes
        };

        let mut batch = ReviewBatch {
            metadata: ReviewMetadata {
                requested: personas.len(),
                concurrent: self.concurrent,
                ..Default::default()
            },
            ..Default::default()
        };
        for outcome in outcomes {
            batch.metadata.total_retries += outcome.retries();
            match outcome {
                PersonaOutcome::Reviewed(review) => batch.reviews.push(review),
                PersonaOutcome::Dropped(dropped) => batch.dropped.push(dropped),
            }
        }
        batch.metadata.reviewed = batch.reviews.len();
        batch.metadata.dropped = batch.dropped.len();

        info!(
            run_id = %ctx.run_id,
            requested = batch.metadata.requested,
            reviewed = batch.metadata.reviewed,
            dropped = batch.metadata.dropped,
            "Review pass finished"
        );
        Ok(batch)
    }

    async fn review_one(
        &self,
        spec: &PersonaSpec,
        ctx: ReviewContext<'_>,
        progress: &dyn PipelineProgress,
        store: &dyn RunRepository,
    ) -> Result<PersonaOutcome, ReviewPassError> {
        let outcome = self.reviewer.review(spec, ctx, progress).await?;
        if let PersonaOutcome::Reviewed(review) = &outcome {
            if store.insert_review(review).await? == InsertOutcome::AlreadyExists {
                debug!(run_id = %ctx.run_id, persona = %review.persona, "Review already stored");
            }
            progress.on_persona_reviewed(ctx.run_id, review);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::ports::progress::NoProgress;
    use crate::testing::{MemoryRepository, ScriptedReviewer, review_content};
    use council_domain::{ModelParams, PersonaRoster, Proposal, RunId};
    use std::sync::Arc;

    fn roster_specs() -> Vec<PersonaSpec> {
        PersonaRoster::default().specs().to_vec()
    }

    async fn run(client: Arc<ScriptedReviewer>, concurrent: bool) -> Result<ReviewBatch, ReviewPassError> {
        run_into(client, concurrent, &MemoryRepository::new(), RunId::new()).await
    }

    async fn run_into(
        client: Arc<ScriptedReviewer>,
        concurrent: bool,
        store: &MemoryRepository,
        run_id: RunId,
    ) -> Result<ReviewBatch, ReviewPassError> {
        let orchestrator = ReviewOrchestrator::new(
            PersonaReviewer::new(client, RetryPolicy::none()),
            concurrent,
        );
        let proposal = Proposal::default();
        let params = ModelParams::default();
        let ctx = ReviewContext {
            run_id,
            proposal: &proposal,
            params: &params,
            prompt_set: "v1",
        };
        orchestrator.review(&roster_specs(), ctx, &NoProgress, store).await
    }

    #[tokio::test]
    async fn test_sequential_keeps_roster_order() {
        let client = Arc::new(ScriptedReviewer::with_default_confidence(0.8));
        let batch = run(client.clone(), false).await.unwrap();

        let order: Vec<_> = batch.reviews.iter().map(|r| r.persona).collect();
        assert_eq!(order, PersonaId::ALL.to_vec());
        assert_eq!(client.review_order(), PersonaId::ALL.to_vec());
        assert_eq!(batch.metadata.requested, 5);
        assert_eq!(batch.metadata.reviewed, 5);
        assert!(!batch.metadata.concurrent);
    }

    #[tokio::test]
    async fn test_concurrent_results_in_roster_order() {
        let client = Arc::new(ScriptedReviewer::with_default_confidence(0.8));
        let batch = run(client, true).await.unwrap();

        let order: Vec<_> = batch.reviews.iter().map(|r| r.persona).collect();
        assert_eq!(order, PersonaId::ALL.to_vec());
        assert!(batch.metadata.concurrent);
    }

    #[tokio::test]
    async fn test_failing_persona_is_dropped_not_fatal() {
        let client = Arc::new(ScriptedReviewer::with_default_confidence(0.8));
        client.script_review(
            PersonaId::Optimist,
            Err(ReviewerError::SchemaInvalid("no json".into())),
        );
        client.script_review(PersonaId::Critic, Ok(review_content(0.4, true)));

        let batch = run(client, false).await.unwrap();
        assert_eq!(batch.reviews.len(), 4);
        assert_eq!(batch.dropped_ids(), vec![PersonaId::Optimist]);
        let critic = batch
            .reviews
            .iter()
            .find(|r| r.persona == PersonaId::Critic)
            .unwrap();
        assert_eq!(critic.confidence(), 0.4);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_pass() {
        let client = Arc::new(ScriptedReviewer::with_default_confidence(0.8));
        client.script_review(PersonaId::UserAdvocate, Err(ReviewerError::Fatal("revoked key".into())));
        let result = run(client, true).await;
        assert_eq!(
            result,
            Err(ReviewPassError::Reviewer(ReviewerError::Fatal("revoked key".into())))
        );
    }

    #[tokio::test]
    async fn test_reviews_are_stored_as_they_finish() {
        let client = Arc::new(ScriptedReviewer::with_default_confidence(0.8));
        client.script_review(
            PersonaId::SecurityGuardian,
            Err(ReviewerError::Fatal("revoked key".into())),
        );
        let store = MemoryRepository::new();
        let run_id = RunId::new();

        let result = run_into(client, false, &store, run_id).await;
        assert!(result.is_err());

        // Personas ahead of the failing one in roster order were kept
        let stored: Vec<PersonaId> = store
            .list_reviews(run_id)
            .await
            .unwrap()
            .iter()
            .map(|r| r.persona)
            .collect();
        let expected: Vec<PersonaId> = PersonaId::ALL
            .iter()
            .copied()
            .take_while(|p| *p != PersonaId::SecurityGuardian)
            .collect();
        assert!(!expected.is_empty());
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn test_store_outage_fails_pass() {
        let client = Arc::new(ScriptedReviewer::with_default_confidence(0.8));
        let store = MemoryRepository::new();
        store.set_unavailable(true);
        let result = run_into(client, false, &store, RunId::new()).await;
        assert!(matches!(result, Err(ReviewPassError::Store(_))));
    }

    #[tokio::test]
    async fn test_reviewers_only_see_the_proposal() {
        let client = Arc::new(ScriptedReviewer::with_default_confidence(0.8));
        run(client.clone(), true).await.unwrap();
        // Every review request carried the same proposal and nothing else
        let requests = client.review_requests();
        assert_eq!(requests.len(), 5);
        assert!(requests.windows(2).all(|w| w[0].input == w[1].input));
    }
}
