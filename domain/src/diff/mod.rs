//! Run comparison
//!
//! [`DiffEngine`] compares two loaded runs: per-field proposal diffs,
//! per-persona score movement and the decision delta.

pub mod engine;
pub mod line_diff;

pub use engine::{
    DEFAULT_MAX_DIFF_LINES, DecisionDelta, DiffEngine, FieldDiff, FieldStatus, PersonaDelta,
    RunDiff, RunRelationship,
};
pub use line_diff::{DiffLine, diff_lines};
