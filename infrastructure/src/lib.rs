//! Infrastructure layer for proposal-council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.
//!
//! | Port | Adapter |
//! |------|---------|
//! | `JobQueue` | [`InMemoryJobQueue`] |
//! | `RunRepository` | [`InMemoryRunRepository`], [`JsonFileRunRepository`] |
//! | `ReviewerClient` | [`OpenAiReviewerClient`] |
//! | `PipelineProgress` | [`JsonlPipelineLog`] |

pub mod config;
pub mod logging;
pub mod queue;
pub mod repository;
pub mod reviewer;

// Re-export commonly used types
pub use config::{ConfigError, ConfigLoader, FileConfig};
pub use logging::JsonlPipelineLog;
pub use queue::InMemoryJobQueue;
pub use repository::{InMemoryRunRepository, JsonFileRunRepository};
pub use reviewer::OpenAiReviewerClient;
