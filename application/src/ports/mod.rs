//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod job_queue;
pub mod progress;
pub mod reviewer_client;
pub mod run_repository;
pub mod version_provider;
