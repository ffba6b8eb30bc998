//! Reviewer client port
//!
//! Defines the interface for the structured completion boundary: one call
//! per step (and per persona for reviews), returning a typed result or a
//! classified error.

use async_trait::async_trait;
use council_domain::{
    ErrorClass, ModelParams, PersonaSpec, Proposal, ReviewContent, StepName,
};
use thiserror::Error;

/// Errors returned by a reviewer client, classified for retry decisions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReviewerError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout")]
    Timeout,

    #[error("Output failed schema validation: {0}")]
    SchemaInvalid(String),

    #[error("Fatal reviewer error: {0}")]
    Fatal(String),
}

impl ReviewerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ReviewerError::RateLimited(_) | ReviewerError::Transport(_) | ReviewerError::Timeout => {
                ErrorClass::Retryable
            }
            ReviewerError::SchemaInvalid(_) => ErrorClass::SchemaInvalid,
            ReviewerError::Fatal(_) => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

/// What the completion is asked to work on
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionInput {
    /// Expand a brief idea into a proposal
    Idea {
        idea: String,
        extra_context: serde_json::Map<String, serde_json::Value>,
    },
    /// Apply edit notes to a parent proposal
    ApplyEdits { parent: Proposal, notes: String },
    /// Review a proposal as a persona
    Review { proposal: Proposal },
}

/// One structured completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub step: StepName,
    /// Set for review requests
    pub persona: Option<PersonaSpec>,
    pub input: CompletionInput,
    pub params: ModelParams,
    /// Prompt-set version stamped on the run
    pub prompt_set: String,
}

impl CompletionRequest {
    pub fn expand(
        input: CompletionInput,
        params: ModelParams,
        prompt_set: impl Into<String>,
    ) -> Self {
        Self {
            step: StepName::Expand,
            persona: None,
            input,
            params,
            prompt_set: prompt_set.into(),
        }
    }

    pub fn review(
        persona: PersonaSpec,
        proposal: Proposal,
        params: ModelParams,
        prompt_set: impl Into<String>,
    ) -> Self {
        Self {
            step: StepName::Review,
            persona: Some(persona),
            input: CompletionInput::Review { proposal },
            params,
            prompt_set: prompt_set.into(),
        }
    }
}

/// Typed completion result
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResult {
    Proposal(Proposal),
    Review(ReviewContent),
}

impl StructuredResult {
    pub fn into_proposal(self) -> Result<Proposal, ReviewerError> {
        match self {
            StructuredResult::Proposal(p) => Ok(p),
            StructuredResult::Review(_) => Err(ReviewerError::SchemaInvalid(
                "expected a proposal, got a review".to_string(),
            )),
        }
    }

    pub fn into_review(self) -> Result<ReviewContent, ReviewerError> {
        match self {
            StructuredResult::Review(r) => Ok(r),
            StructuredResult::Proposal(_) => Err(ReviewerError::SchemaInvalid(
                "expected a review, got a proposal".to_string(),
            )),
        }
    }
}

/// Structured completion boundary
///
/// Implementations build prompts, call the model and validate the output.
/// They may retry schema failures internally; anything they return as
/// `SchemaInvalid` is final.
#[async_trait]
pub trait ReviewerClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<StructuredResult, ReviewerError>;
}
