//! Persona identities and the validated roster

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance when checking that roster weights sum to 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Fixed reviewer roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    Architect,
    Critic,
    Optimist,
    SecurityGuardian,
    UserAdvocate,
}

impl PersonaId {
    pub const ALL: [PersonaId; 5] = [
        PersonaId::Architect,
        PersonaId::Critic,
        PersonaId::Optimist,
        PersonaId::SecurityGuardian,
        PersonaId::UserAdvocate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaId::Architect => "architect",
            PersonaId::Critic => "critic",
            PersonaId::Optimist => "optimist",
            PersonaId::SecurityGuardian => "security_guardian",
            PersonaId::UserAdvocate => "user_advocate",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PersonaId::Architect => "Architect",
            PersonaId::Critic => "Critic",
            PersonaId::Optimist => "Optimist",
            PersonaId::SecurityGuardian => "Security Guardian",
            PersonaId::UserAdvocate => "User Advocate",
        }
    }

    /// What this persona looks for when reviewing.
    pub fn focus(&self) -> &'static str {
        match self {
            PersonaId::Architect => {
                "system design, scalability, maintainability, integration points and technical debt"
            }
            PersonaId::Critic => {
                "weak assumptions, missing evidence, failure modes and risks the author glossed over"
            }
            PersonaId::Optimist => {
                "upside, opportunities, quick wins and what would make the proposal succeed"
            }
            PersonaId::SecurityGuardian => {
                "authentication, authorization, data protection, abuse cases and compliance exposure"
            }
            PersonaId::UserAdvocate => {
                "user experience, accessibility, onboarding cost and whether users actually need this"
            }
        }
    }

    fn default_weight(&self) -> f64 {
        match self {
            PersonaId::Architect => 0.25,
            PersonaId::Critic => 0.25,
            PersonaId::Optimist => 0.15,
            PersonaId::SecurityGuardian => 0.20,
            PersonaId::UserAdvocate => 0.15,
        }
    }
}

impl std::fmt::Display for PersonaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PersonaId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        PersonaId::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized || p.as_str().replace('_', "") == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown persona: {}. Valid: architect, critic, optimist, security_guardian, user_advocate",
                    s
                )
            })
    }
}

/// Per-persona configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSpec {
    pub id: PersonaId,
    pub weight: f64,
    /// Whether this persona's security concerns force a rerun on revision
    pub veto_capable: bool,
    /// Prompt template reference resolved by the reviewer client
    pub prompt_template: String,
}

impl PersonaSpec {
    pub fn new(id: PersonaId, weight: f64) -> Self {
        Self {
            id,
            weight,
            veto_capable: id == PersonaId::SecurityGuardian,
            prompt_template: format!("persona/{}", id.as_str()),
        }
    }

    pub fn with_veto(mut self, veto_capable: bool) -> Self {
        self.veto_capable = veto_capable;
        self
    }
}

/// Roster validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RosterError {
    #[error("Persona roster is empty")]
    Empty,

    #[error("Persona {0} appears more than once")]
    Duplicate(PersonaId),

    #[error("Persona {persona} has invalid weight {weight}")]
    InvalidWeight { persona: PersonaId, weight: f64 },

    #[error("Persona weights sum to {0}, expected 1.0")]
    WeightSum(f64),
}

/// A validated, ordered set of personas whose weights sum to 1.0.
///
/// Order is the deterministic review and aggregation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonaRoster {
    specs: Vec<PersonaSpec>,
}

impl PersonaRoster {
    pub fn new(specs: Vec<PersonaSpec>) -> Result<Self, RosterError> {
        if specs.is_empty() {
            return Err(RosterError::Empty);
        }

        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.id == spec.id) {
                return Err(RosterError::Duplicate(spec.id));
            }
            if !spec.weight.is_finite() || spec.weight < 0.0 {
                return Err(RosterError::InvalidWeight {
                    persona: spec.id,
                    weight: spec.weight,
                });
            }
        }

        let sum: f64 = specs.iter().map(|s| s.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RosterError::WeightSum(sum));
        }

        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[PersonaSpec] {
        &self.specs
    }

    pub fn get(&self, id: PersonaId) -> Option<&PersonaSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<PersonaId> {
        self.specs.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Specs for `ids`, in roster order. Unknown ids are ignored.
    pub fn subset(&self, ids: &[PersonaId]) -> Vec<&PersonaSpec> {
        self.specs.iter().filter(|s| ids.contains(&s.id)).collect()
    }
}

impl Default for PersonaRoster {
    fn default() -> Self {
        Self {
            specs: PersonaId::ALL
                .into_iter()
                .map(|id| PersonaSpec::new(id, id.default_weight()))
                .collect(),
        }
    }
}

impl<'de> Deserialize<'de> for PersonaRoster {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            specs: Vec<PersonaSpec>,
        }
        let raw = Raw::deserialize(deserializer)?;
        PersonaRoster::new(raw.specs).map_err(serde::de::Error::custom)
    }
}
