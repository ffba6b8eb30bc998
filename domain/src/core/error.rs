//! Domain error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-level errors
///
/// These are raised only when a caller violates an invariant of a domain
/// type. Normal domain conditions (a dropped persona, a rejected proposal)
/// are expressed as data, never as errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid run status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Parent run {parent} is {status}, revisions require a completed parent")]
    ParentNotCompleted { parent: String, status: String },

    #[error("Revision requires edited proposal text or edit notes")]
    EmptyRevision,

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),
}

/// Classification carried by every failure that crosses a component boundary.
///
/// Callers dispatch on this with a plain `match`:
/// - `Retryable` failures are retried locally, then redelivered by the queue
/// - `SchemaInvalid` failures are terminal for the step that produced them
/// - `Fatal` failures are terminal for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Retryable,
    SchemaInvalid,
    Fatal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Retryable => "retryable",
            ErrorClass::SchemaInvalid => "schema_invalid",
            ErrorClass::Fatal => "fatal",
        }
    }

    /// Whether a failure of this class can never succeed on redelivery.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ErrorClass::Retryable)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
