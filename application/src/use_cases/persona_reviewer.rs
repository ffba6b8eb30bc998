//! Persona reviewer
//!
//! Wraps the [`ReviewerClient`] for a single persona: builds the request,
//! retries transient failures with exponential backoff and turns the result
//! into a [`PersonaReview`]. A persona that keeps failing is dropped rather
//! than failing the run.

use crate::config::RetryPolicy;
use crate::ports::progress::PipelineProgress;
use crate::ports::reviewer_client::{CompletionRequest, ReviewerClient, ReviewerError};
use chrono::Utc;
use council_domain::{
    DroppedPersona, ErrorClass, ExecutionMetadata, ModelParams, PersonaReview, PersonaSpec,
    Proposal, RunId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of reviewing one persona
#[derive(Debug, Clone, PartialEq)]
pub enum PersonaOutcome {
    Reviewed(PersonaReview),
    Dropped(DroppedPersona),
}

impl PersonaOutcome {
    /// Attempts beyond the first
    pub fn retries(&self) -> u32 {
        match self {
            PersonaOutcome::Reviewed(review) => review.execution.retry_count,
            PersonaOutcome::Dropped(dropped) => dropped.attempts.saturating_sub(1),
        }
    }
}

/// Everything a persona review call needs besides the persona itself
#[derive(Debug, Clone, Copy)]
pub struct ReviewContext<'a> {
    pub run_id: RunId,
    pub proposal: &'a Proposal,
    pub params: &'a ModelParams,
    pub prompt_set: &'a str,
}

pub struct PersonaReviewer {
    client: Arc<dyn ReviewerClient>,
    retry: RetryPolicy,
}

impl PersonaReviewer {
    pub fn new(client: Arc<dyn ReviewerClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Review `ctx.proposal` as `spec`.
    ///
    /// Retryable errors are retried up to the policy bound, then the persona
    /// is dropped. Schema-invalid output drops the persona immediately.
    /// Only fatal errors are returned.
    pub async fn review(
        &self,
        spec: &PersonaSpec,
        ctx: ReviewContext<'_>,
        progress: &dyn PipelineProgress,
    ) -> Result<PersonaOutcome, ReviewerError> {
        let request = CompletionRequest::review(
            spec.clone(),
            ctx.proposal.clone(),
            ctx.params.clone(),
            ctx.prompt_set,
        );

        let mut attempt: u32 = 0;
        loop {
            debug!(run_id = %ctx.run_id, persona = %spec.id, attempt = attempt + 1, "Requesting review");

            let error = match self.client.complete(&request).await.and_then(|r| r.into_review()) {
                Ok(content) => {
                    let review = PersonaReview::new(
                        ctx.run_id,
                        spec.id,
                        content,
                        ExecutionMetadata {
                            model: ctx.params.model.to_string(),
                            temperature: ctx.params.temperature,
                            retry_count: attempt,
                            prompt_set: ctx.prompt_set.to_string(),
                        },
                        Utc::now(),
                    );
                    info!(
                        run_id = %ctx.run_id,
                        persona = %spec.id,
                        confidence = review.confidence(),
                        retries = attempt,
                        "Persona reviewed"
                    );
                    return Ok(PersonaOutcome::Reviewed(review));
                }
                Err(e) => e,
            };

            match error.class() {
                ErrorClass::Retryable if attempt < self.retry.max_retries => {
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        run_id = %ctx.run_id,
                        persona = %spec.id,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "Persona review failed, retrying"
                    );
                    progress.on_persona_retry(ctx.run_id, spec.id, attempt + 1, &error.to_string());
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                ErrorClass::Retryable | ErrorClass::SchemaInvalid => {
                    let dropped = DroppedPersona {
                        persona: spec.id,
                        reason: error.to_string(),
                        attempts: attempt + 1,
                    };
                    warn!(
                        run_id = %ctx.run_id,
                        persona = %spec.id,
                        attempts = dropped.attempts,
                        reason = %dropped.reason,
                        "Dropping persona"
                    );
                    progress.on_persona_dropped(ctx.run_id, &dropped);
                    return Ok(PersonaOutcome::Dropped(dropped));
                }
                ErrorClass::Fatal => return Err(error),
            }
        }
    }
}
