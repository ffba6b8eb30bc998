//! Version provider port
//!
//! Supplies the schema and prompt-set versions stamped onto every run.

use council_domain::VersionTags;

pub trait VersionProvider: Send + Sync {
    fn versions(&self) -> VersionTags;
}

/// Fixed versions, typically read from configuration at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticVersions(pub VersionTags);

impl VersionProvider for StaticVersions {
    fn versions(&self) -> VersionTags {
        self.0.clone()
    }
}
