//! Persona reviews and structured model output parsing

pub mod entities;
pub mod parsing;

pub use entities::{
    BlockingIssue, DroppedPersona, ExecutionMetadata, PersonaReview, ReviewContent, ReviewOrigin,
};
pub use parsing::{OutputParseError, parse_proposal_output, parse_review_output};
