//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`WorkerParams`]: pool size and queue deadlines
//! - [`PipelineParams`]: step and job timeouts, step attempts
//! - [`RetryPolicy`]: per-persona retry and backoff
//! - [`ReviewParams`], [`RevisionParams`], [`DiffParams`]: review, revision and diff knobs
//! - [`CouncilConfig`]: container for all of the above

pub mod council_config;
pub mod pipeline_params;
pub mod retry_policy;
pub mod worker_params;

pub use council_config::CouncilConfig;
pub use pipeline_params::{DiffParams, PipelineParams, ReviewParams, RevisionParams};
pub use retry_policy::RetryPolicy;
pub use worker_params::WorkerParams;
