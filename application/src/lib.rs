//! Application layer for proposal-council
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{
    CouncilConfig, DiffParams, PipelineParams, RetryPolicy, ReviewParams, RevisionParams,
    WorkerParams,
};
pub use ports::{
    job_queue::{Delivery, JobQueue, QueueError},
    progress::{CompositeProgress, NoProgress, PipelineProgress},
    reviewer_client::{
        CompletionInput, CompletionRequest, ReviewerClient, ReviewerError, StructuredResult,
    },
    run_repository::{InsertOutcome, RepositoryError, RunRepository},
    version_provider::{StaticVersions, VersionProvider},
};
pub use use_cases::compare_runs::{CompareRunsError, CompareRunsUseCase};
pub use use_cases::create_revision::{CreateRevisionInput, CreateRevisionUseCase, RevisionError};
pub use use_cases::job_worker::{Disposition, JobWorker, WorkerError, WorkerReport};
pub use use_cases::persona_reviewer::{PersonaOutcome, PersonaReviewer, ReviewContext};
pub use use_cases::pipeline_executor::{PipelineError, PipelineExecutor, RunOutcome};
pub use use_cases::review_orchestrator::{
    ReviewBatch, ReviewMetadata, ReviewOrchestrator, ReviewPassError,
};
pub use use_cases::submit_run::{SubmitRunError, SubmitRunInput, SubmitRunUseCase};
