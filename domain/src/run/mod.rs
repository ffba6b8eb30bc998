//! Run lineage domain
//!
//! A [`Run`](entities::Run) is one pass of a proposal through the pipeline:
//!
//! ```text
//!   queued ──► running ──► completed
//!                 │
//!                 └──────► failed
//! ```
//!
//! Status is monotonic. A revision run always points at a completed parent
//! through `parent_run_id`, which forms the lineage used by revisions and diffs.

pub mod aggregate;
pub mod entities;
pub mod job;
pub mod proposal;
pub mod step;
