//! Reviewer endpoint, versions and persona overrides from TOML

use council_domain::config::validation::{ConfigIssue, ConfigIssueCode, Severity};
use council_domain::{Model, ModelParams, PersonaId, PersonaRoster, PersonaSpec, VersionTags};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OpenAI-compatible completion endpoint (`[reviewer]`)
///
/// # Example
///
/// ```toml
/// [reviewer]
/// base_url = "https://api.openai.com/v1"
/// api_key_env = "OPENAI_API_KEY"   # name of the variable, never the key itself
/// model = "gpt-4o-mini"
/// temperature = 0.2
/// request_timeout_secs = 120
/// max_schema_retries = 1           # re-ask once when the reply is not valid JSON
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReviewerConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f64,
    pub request_timeout_secs: u64,
    pub max_schema_retries: u32,
}

impl Default for FileReviewerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: Model::default().to_string(),
            temperature: 0.2,
            request_timeout_secs: 120,
            max_schema_retries: 1,
        }
    }
}

impl FileReviewerConfig {
    pub fn model_params(&self) -> ModelParams {
        // unknown names become Model::Custom
        let model = match self.model.trim().parse::<Model>() {
            Ok(model) => model,
            Err(never) => match never {},
        };
        ModelParams::new(model, self.temperature)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.model.trim().is_empty() {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                code: ConfigIssueCode::EmptyModelName {
                    field: "reviewer.model".to_string(),
                },
                message: "reviewer.model: model name cannot be empty".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            issues.push(ConfigIssue {
                severity: Severity::Warning,
                code: ConfigIssueCode::OutOfRange {
                    field: "reviewer.temperature".to_string(),
                },
                message: format!(
                    "reviewer.temperature: {} is outside [0, 2] and will be clamped",
                    self.temperature
                ),
            });
        }
        if self.request_timeout_secs == 0 {
            issues.push(ConfigIssue::out_of_range(
                "reviewer.request_timeout_secs",
                "must be at least 1",
            ));
        }
        issues
    }
}

/// Version tags stamped on every run (`[versions]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileVersionsConfig {
    pub schema: String,
    pub prompt_set: String,
}

impl Default for FileVersionsConfig {
    fn default() -> Self {
        let defaults = VersionTags::default();
        Self {
            schema: defaults.schema,
            prompt_set: defaults.prompt_set,
        }
    }
}

impl FileVersionsConfig {
    pub fn to_tags(&self) -> VersionTags {
        VersionTags::new(&self.schema, &self.prompt_set)
    }
}

/// Override for one persona (`[personas.<name>]`)
///
/// ```toml
/// [personas.security_guardian]
/// weight = 0.30
///
/// [personas.optimist]
/// weight = 0.05
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePersonaConfig {
    pub weight: Option<f64>,
    pub veto_capable: Option<bool>,
}

/// Apply `[personas.*]` overrides to the default roster.
///
/// Unknown names and a roster that fails validation are errors; the
/// default roster is returned alongside them.
pub fn build_roster(overrides: &BTreeMap<String, FilePersonaConfig>) -> (PersonaRoster, Vec<ConfigIssue>) {
    let mut issues = Vec::new();
    let mut specs: Vec<PersonaSpec> = PersonaRoster::default().specs().to_vec();

    for (name, config) in overrides {
        let Ok(id) = name.parse::<PersonaId>() else {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                code: ConfigIssueCode::UnknownPersona { name: name.clone() },
                message: format!(
                    "personas.{}: unknown persona (valid: {})",
                    name,
                    PersonaId::ALL
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
            continue;
        };
        if let Some(spec) = specs.iter_mut().find(|s| s.id == id) {
            if let Some(weight) = config.weight {
                spec.weight = weight;
            }
            if let Some(veto) = config.veto_capable {
                spec.veto_capable = veto;
            }
        }
    }

    match PersonaRoster::new(specs) {
        Ok(roster) => (roster, issues),
        Err(e) => {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                code: ConfigIssueCode::InvalidPersonaWeights,
                message: format!("personas: {}", e),
            });
            (PersonaRoster::default(), issues)
        }
    }
}
