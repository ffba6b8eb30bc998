//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`]: reviewer model identifiers and sampling parameters
//! - [`error::DomainError`]: invariant violations raised by domain types
//! - [`error::ErrorClass`]: retryable / schema-invalid / fatal classification

pub mod error;
pub mod model;
