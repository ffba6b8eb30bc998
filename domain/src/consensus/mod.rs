//! Council consensus
//!
//! Persona reviews are folded into a single [`Decision`]:
//!
//! ```text
//! reviews ──► weighted confidence ──► base label ──► security veto ──► minority reports
//!             Σ weight_i × conf_i     ≥0.80 approve   security_critical   dissenting personas
//!                                     ≥0.60 revise    ⇒ at least revise
//!                                     else  reject
//! ```
//!
//! Weights of dropped personas are either renormalized across the present
//! personas or kept with zero confidence, per [`DropPolicy`].

pub mod aggregator;
pub mod decision;
pub mod label;

pub use aggregator::DecisionAggregator;
pub use decision::{Decision, DissentReason, MinorityReport, PersonaScore};
pub use label::{APPROVE_THRESHOLD, DecisionLabel, DropPolicy, REVISE_THRESHOLD};
