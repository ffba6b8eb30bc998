//! Raw TOML configuration data types
//!
//! These structs mirror the TOML file one-to-one. Conversion into the
//! application's parameter types happens in [`FileConfig::to_council_config`],
//! after [`FileConfig::validate`] has had a chance to report problems.

mod review;
mod reviewer;
mod worker;

pub use review::{FileDiffConfig, FileRetryConfig, FileReviewConfig, FileRevisionConfig};
pub use reviewer::{FilePersonaConfig, FileReviewerConfig, FileVersionsConfig, build_roster};
pub use worker::{FilePipelineConfig, FileWorkerConfig};

use council_application::config::CouncilConfig;
use council_domain::config::validation::{ConfigIssue, has_errors};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Configuration could not be turned into a runnable setup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {} issue(s)", .0.len())]
    Invalid(Vec<ConfigIssue>),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Job worker settings
    pub worker: FileWorkerConfig,
    /// Step and job timeouts
    pub pipeline: FilePipelineConfig,
    /// Per-persona retry backoff
    pub retry: FileRetryConfig,
    /// Review fan-out and dropped-persona policy
    pub review: FileReviewConfig,
    pub revision: FileRevisionConfig,
    pub diff: FileDiffConfig,
    /// Completion endpoint used for expand and review calls
    pub reviewer: FileReviewerConfig,
    /// Version tags stamped on new runs
    pub versions: FileVersionsConfig,
    /// Per-persona overrides keyed by persona name
    pub personas: BTreeMap<String, FilePersonaConfig>,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Checks run per section first, then the cross-section invariants of
    /// the converted [`CouncilConfig`] (job timeout against ack deadline).
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        // 1. Section-local ranges
        issues.extend(self.worker.validate());
        issues.extend(self.pipeline.validate());
        issues.extend(self.retry.validate());
        issues.extend(self.revision.validate());
        issues.extend(self.diff.validate());
        issues.extend(self.reviewer.validate());

        // 2. Enum parse validation
        issues.extend(self.review.parse_drop_policy().1);

        // 3. Persona overrides
        issues.extend(build_roster(&self.personas).1);

        // 4. Cross-section invariants, skipping what step 1 already reported
        for issue in self.to_council_config().validate() {
            if !issues.iter().any(|known| known.code == issue.code) {
                issues.push(issue);
            }
        }

        issues
    }

    /// Convert into application configuration.
    ///
    /// Invalid values fall back to defaults here; call [`validate`](Self::validate)
    /// first to surface them.
    pub fn to_council_config(&self) -> CouncilConfig {
        CouncilConfig {
            worker: self.worker.to_params(),
            pipeline: self.pipeline.to_params(),
            retry: self.retry.to_policy(),
            review: self.review.to_params(),
            revision: self.revision.to_params(),
            diff: self.diff.to_params(),
            roster: build_roster(&self.personas).0,
            model: self.reviewer.model_params(),
            versions: self.versions.to_tags(),
        }
    }

    /// Validate and convert in one go, failing on any error-level issue.
    ///
    /// Warnings are returned alongside the config for the caller to log.
    pub fn into_validated(self) -> Result<(CouncilConfig, Vec<ConfigIssue>), ConfigError> {
        let issues = self.validate();
        if has_errors(&issues) {
            return Err(ConfigError::Invalid(issues));
        }
        Ok((self.to_council_config(), issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{ConfigIssueCode, DropPolicy, PersonaId, Severity};
    use std::time::Duration;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[worker]
max_concurrency = 8
ack_deadline_secs = 900
extend_margin_secs = 120

[pipeline]
step_timeout_secs = 200
job_timeout_secs = 800

[retry]
max_retries_per_persona = 2
initial_backoff_ms = 500

[review]
concurrent = true
drop_policy = "zero_confidence"

[revision]
rerun_threshold = 0.7

[reviewer]
base_url = "http://localhost:8080/v1"
model = "gpt-4o"

[versions]
prompt_set = "v2"

[personas.security_guardian]
weight = 0.30

[personas.optimist]
weight = 0.05
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_empty(), "{:?}", config.validate());

        let council = config.to_council_config();
        assert_eq!(council.worker.max_concurrency, 8);
        assert_eq!(council.worker.ack_deadline, Duration::from_secs(900));
        assert_eq!(council.pipeline.job_timeout, Duration::from_secs(800));
        assert_eq!(council.retry.max_retries, 2);
        assert!(council.review.concurrent);
        assert_eq!(council.review.drop_policy, DropPolicy::ZeroConfidence);
        assert_eq!(council.revision.rerun_threshold, 0.7);
        assert_eq!(council.versions.prompt_set, "v2");
        assert_eq!(council.versions.schema, "1");
        assert_eq!(
            council.roster.get(PersonaId::SecurityGuardian).unwrap().weight,
            0.30
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_job_timeout_beyond_ack_deadline() {
        let config: FileConfig = toml::from_str(
            r#"
[worker]
ack_deadline_secs = 300

[pipeline]
step_timeout_secs = 100
job_timeout_secs = 400
"#,
        )
        .unwrap();
        let issues = config.validate();
        assert!(
            issues
                .iter()
                .any(|i| i.code == ConfigIssueCode::JobTimeoutExceedsAckDeadline)
        );
        assert!(matches!(
            config.into_validated(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_collects_every_issue() {
        let config: FileConfig = toml::from_str(
            r#"
[worker]
max_concurrency = 0

[review]
drop_policy = "average"

[revision]
rerun_threshold = -0.1

[personas.critic]
weight = 0.9
"#,
        )
        .unwrap();
        let issues = config.validate();
        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        // concurrency, drop policy, threshold, weights; concurrency is not repeated
        assert_eq!(errors, 4, "{:#?}", issues);
    }

    #[test]
    fn test_warnings_do_not_block() {
        let config = FileConfig {
            reviewer: FileReviewerConfig {
                temperature: 3.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let (_, warnings) = config.into_validated().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
    }
}
