//! Domain layer for proposal-council
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns, and no
//! async runtime: everything here is plain data and pure functions.
//!
//! # Core Concepts
//!
//! ## Run
//!
//! One end-to-end pass of a proposal through the fixed pipeline
//! `expand → review × N → aggregate`. A run is either `initial` or a
//! `revision` of an earlier completed run.
//!
//! ## Council
//!
//! A fixed roster of reviewer personas, each with a weight. Their independent
//! reviews are folded into a weighted [`Decision`] with a security veto and
//! minority reports for dissenting personas.
//!
//! ## Revision and Diff
//!
//! The [`RevisionPlanner`] decides which parent reviews can be reused for an
//! edited proposal, and the [`DiffEngine`] compares two completed runs.

pub mod config;
pub mod consensus;
pub mod core;
pub mod diff;
pub mod persona;
pub mod prompt;
pub mod review;
pub mod revision;
pub mod run;
pub mod util;

// Re-export commonly used types
pub use config::validation::{ConfigIssue, ConfigIssueCode, Severity, has_errors};
pub use consensus::{
    APPROVE_THRESHOLD, Decision, DecisionAggregator, DecisionLabel, DissentReason, DropPolicy,
    MinorityReport, PersonaScore, REVISE_THRESHOLD,
};
pub use core::{
    error::{DomainError, ErrorClass},
    model::{Model, ModelParams},
};
pub use diff::{
    DEFAULT_MAX_DIFF_LINES, DecisionDelta, DiffEngine, DiffLine, FieldDiff, FieldStatus, PersonaDelta, RunDiff,
    RunRelationship, diff_lines,
};
pub use persona::{PersonaId, PersonaRoster, PersonaSpec, RosterError};
pub use prompt::PromptTemplate;
pub use review::{
    BlockingIssue, DroppedPersona, ExecutionMetadata, OutputParseError, PersonaReview,
    ReviewContent, ReviewOrigin, parse_proposal_output, parse_review_output,
};
pub use revision::{DEFAULT_RERUN_THRESHOLD, RerunReason, RevisionPlan, RevisionPlanner};
pub use run::{
    aggregate::RunAggregate,
    entities::{Run, RunFailure, RunId, RunInput, RunKind, RunStatus, VersionTags},
    job::{JobMessage, JobPayload, JobPriority},
    proposal::{Proposal, ProposalField, ProposalVersion},
    step::{StepName, StepProgress, StepStatus},
};
