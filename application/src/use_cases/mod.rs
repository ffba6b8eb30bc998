//! Use cases
//!
//! Application-level operations that orchestrate domain logic.
//!
//! ```text
//! JobWorker ─► PipelineExecutor ─► ReviewOrchestrator ─► PersonaReviewer ─► ReviewerClient
//!                    │
//!                    ├─► RevisionPlanner / DiffEngine (revisions)
//!                    └─► DecisionAggregator
//! ```

pub mod compare_runs;
pub mod create_revision;
pub mod job_worker;
pub mod persona_reviewer;
pub mod pipeline_executor;
pub mod review_orchestrator;
pub mod submit_run;
