//! Review entities

use crate::persona::PersonaId;
use crate::run::entities::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A problem the persona considers blocking for approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingIssue {
    pub description: String,
    #[serde(default)]
    pub security_critical: bool,
}

impl BlockingIssue {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            security_critical: false,
        }
    }

    pub fn security(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            security_critical: true,
        }
    }
}

/// The structured content of one persona's review, as returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewContent {
    pub confidence: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub blocking_issues: Vec<BlockingIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<String>,
    #[serde(default)]
    pub dependency_risks: Vec<String>,
}

impl ReviewContent {
    pub fn with_confidence(confidence: f64) -> Self {
        Self {
            confidence,
            ..Default::default()
        }
    }
}

/// How a review was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewOrigin {
    #[default]
    Fresh,
    /// Copied unchanged from the parent run of a revision
    Reused { from_run: RunId },
}

/// Model and retry details recorded for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub model: String,
    pub temperature: f64,
    /// Retries spent before this output was accepted
    pub retry_count: u32,
    pub prompt_set: String,
}

/// One persona's review within one run.
///
/// At most one exists per `(run_id, persona)`. Never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaReview {
    pub run_id: RunId,
    pub persona: PersonaId,
    #[serde(flatten)]
    pub content: ReviewContent,
    pub execution: ExecutionMetadata,
    #[serde(default)]
    pub origin: ReviewOrigin,
    pub created_at: DateTime<Utc>,
}

impl PersonaReview {
    pub fn new(
        run_id: RunId,
        persona: PersonaId,
        content: ReviewContent,
        execution: ExecutionMetadata,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            persona,
            content,
            execution,
            origin: ReviewOrigin::Fresh,
            created_at,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.content.confidence
    }

    pub fn has_blocking_issues(&self) -> bool {
        !self.content.blocking_issues.is_empty()
    }

    pub fn has_security_critical_issue(&self) -> bool {
        self.content
            .blocking_issues
            .iter()
            .any(|issue| issue.security_critical)
    }

    /// Copy this review into `run_id`, marking where it came from.
    pub fn reuse_for(&self, run_id: RunId, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            persona: self.persona,
            content: self.content.clone(),
            execution: self.execution.clone(),
            origin: ReviewOrigin::Reused {
                from_run: self.run_id,
            },
            created_at: now,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self.origin, ReviewOrigin::Reused { .. })
    }
}

/// A persona excluded from a run after exhausting its attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedPersona {
    pub persona: PersonaId,
    pub reason: String,
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(issues: Vec<BlockingIssue>) -> PersonaReview {
        let content = ReviewContent {
            confidence: 0.8,
            blocking_issues: issues,
            ..Default::default()
        };
        PersonaReview::new(
            RunId::new(),
            PersonaId::Critic,
            content,
            ExecutionMetadata {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.2,
                retry_count: 0,
                prompt_set: "v1".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_security_critical_detection() {
        assert!(!review(vec![]).has_blocking_issues());
        let r = review(vec![BlockingIssue::new("No rollback plan")]);
        assert!(r.has_blocking_issues());
        assert!(!r.has_security_critical_issue());
        let r = review(vec![BlockingIssue::security("Tokens logged in plaintext")]);
        assert!(r.has_security_critical_issue());
    }

    #[test]
    fn test_reuse_for_records_origin() {
        let parent = review(vec![]);
        let child_run = RunId::new();
        let reused = parent.reuse_for(child_run, Utc::now());
        assert_eq!(reused.run_id, child_run);
        assert_eq!(reused.content, parent.content);
        assert_eq!(
            reused.origin,
            ReviewOrigin::Reused {
                from_run: parent.run_id
            }
        );
        assert!(reused.is_reused());
    }

    #[test]
    fn test_serializes_flat() {
        let value = serde_json::to_value(review(vec![])).unwrap();
        assert_eq!(value["confidence"], 0.8);
        assert_eq!(value["persona"], "critic");
        assert_eq!(value["origin"]["kind"], "fresh");
    }
}
