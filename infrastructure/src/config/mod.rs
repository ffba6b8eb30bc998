//! Configuration file loading for proposal-council
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `COUNCIL_<SECTION>__<KEY>` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./council.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/council/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigError, FileConfig, FileDiffConfig, FilePersonaConfig, FilePipelineConfig,
    FileRetryConfig, FileReviewConfig, FileReviewerConfig, FileRevisionConfig, FileVersionsConfig,
    FileWorkerConfig, build_roster,
};
pub use loader::ConfigLoader;
