//! Revision planning
//!
//! Decides, per persona, whether a parent review can be carried over to a
//! revision run unchanged or must be recomputed against the edited proposal.
//!
//! A persona is rerun when its parent review meets any of:
//!
//! | Criterion | Reason |
//! |-----------|--------|
//! | confidence < rerun threshold (0.70) | [`RerunReason::LowConfidence`] |
//! | any blocking issue | [`RerunReason::BlockingIssues`] |
//! | veto-capable persona with concerns or a security-critical issue | [`RerunReason::SecurityConcerns`] |
//! | no parent review (dropped in the parent run) | [`RerunReason::MissingParentReview`] |

pub mod planner;

pub use planner::{DEFAULT_RERUN_THRESHOLD, RerunReason, RevisionPlan, RevisionPlanner};
