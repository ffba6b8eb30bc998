//! The aggregated council decision

use crate::consensus::label::DecisionLabel;
use crate::persona::PersonaId;
use serde::{Deserialize, Serialize};

/// One persona's share of the weighted confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaScore {
    pub persona: PersonaId,
    /// `None` when the persona was dropped
    pub confidence: Option<f64>,
    /// Roster weight
    pub weight: f64,
    /// Weight actually applied after drop handling
    pub effective_weight: f64,
    pub contribution: f64,
    pub dropped: bool,
}

/// Why a persona dissents from the council decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DissentReason {
    /// Approved, but this persona's own confidence is below the revise threshold
    LowConfidence,
    /// Approved or sent to revision while this persona reported blocking issues
    BlockingIssues,
}

/// A dissenting opinion attached to a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinorityReport {
    pub persona: PersonaId,
    pub confidence: f64,
    pub reasons: Vec<DissentReason>,
    pub core_concerns: Vec<String>,
    pub recommended_mitigation: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strengths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_concerns: Vec<String>,
}

/// The outcome of aggregating persona reviews.
///
/// Contains no timestamps or ids: identical reviews yield an identical
/// decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub weighted_confidence: f64,
    pub label: DecisionLabel,
    /// Whether a security-critical blocking issue lowered the label
    pub vetoed: bool,
    pub breakdown: Vec<PersonaScore>,
    /// Always present, possibly empty
    #[serde(default)]
    pub minority_reports: Vec<MinorityReport>,
}

impl Decision {
    pub fn dropped_personas(&self) -> Vec<PersonaId> {
        self.breakdown
            .iter()
            .filter(|s| s.dropped)
            .map(|s| s.persona)
            .collect()
    }

    pub fn minority_report_for(&self, persona: PersonaId) -> Option<&MinorityReport> {
        self.minority_reports.iter().find(|m| m.persona == persona)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} (weighted confidence {:.4}{})",
            self.label.emoji(),
            self.label,
            self.weighted_confidence,
            if self.vetoed { ", security veto" } else { "" }
        )
    }
}
