//! Weighted decision aggregation

use crate::consensus::decision::{Decision, DissentReason, MinorityReport, PersonaScore};
use crate::consensus::label::{DecisionLabel, DropPolicy, REVISE_THRESHOLD};
use crate::persona::{PersonaRoster, PersonaSpec};
use crate::review::PersonaReview;

/// Folds persona reviews into a [`Decision`].
///
/// Pure: walks the roster in order, so the result does not depend on the
/// order of the review slice. Personas with no review are treated as dropped.
#[derive(Debug, Clone)]
pub struct DecisionAggregator {
    roster: PersonaRoster,
    drop_policy: DropPolicy,
}

impl DecisionAggregator {
    pub fn new(roster: PersonaRoster, drop_policy: DropPolicy) -> Self {
        Self {
            roster,
            drop_policy,
        }
    }

    pub fn roster(&self) -> &PersonaRoster {
        &self.roster
    }

    pub fn aggregate(&self, reviews: &[PersonaReview]) -> Decision {
        let present: Vec<(&PersonaSpec, Option<&PersonaReview>)> = self
            .roster
            .specs()
            .iter()
            .map(|spec| (spec, reviews.iter().find(|r| r.persona == spec.id)))
            .collect();

        let present_weight: f64 = present
            .iter()
            .filter(|(_, review)| review.is_some())
            .map(|(spec, _)| spec.weight)
            .sum();
        let any_dropped = present.iter().any(|(_, review)| review.is_none());
        let renormalize =
            any_dropped && self.drop_policy == DropPolicy::Renormalize && present_weight > 0.0;

        let breakdown: Vec<PersonaScore> = present
            .iter()
            .map(|(spec, review)| match review {
                Some(review) => {
                    let effective_weight = if renormalize {
                        spec.weight / present_weight
                    } else {
                        spec.weight
                    };
                    let confidence = review.confidence();
                    PersonaScore {
                        persona: spec.id,
                        confidence: Some(confidence),
                        weight: spec.weight,
                        effective_weight,
                        contribution: effective_weight * confidence,
                        dropped: false,
                    }
                }
                None => PersonaScore {
                    persona: spec.id,
                    confidence: None,
                    weight: spec.weight,
                    effective_weight: match self.drop_policy {
                        DropPolicy::Renormalize => 0.0,
                        DropPolicy::ZeroConfidence => spec.weight,
                    },
                    contribution: 0.0,
                    dropped: true,
                },
            })
            .collect();

        let weighted_confidence: f64 = breakdown
            .iter()
            .map(|score| score.contribution)
            .sum::<f64>()
            .clamp(0.0, 1.0);

        let base_label = if present_weight > 0.0 {
            DecisionLabel::from_confidence(weighted_confidence)
        } else {
            DecisionLabel::Reject
        };

        let vetoed_reviews = present
            .iter()
            .filter_map(|(_, review)| *review)
            .any(|review| review.has_security_critical_issue());
        let label = if vetoed_reviews {
            base_label.at_least(DecisionLabel::Revise)
        } else {
            base_label
        };

        let minority_reports = present
            .iter()
            .filter_map(|(_, review)| *review)
            .filter_map(|review| minority_report(label, review))
            .collect();

        Decision {
            weighted_confidence,
            label,
            vetoed: label != base_label,
            breakdown,
            minority_reports,
        }
    }
}

fn minority_report(label: DecisionLabel, review: &PersonaReview) -> Option<MinorityReport> {
    let mut reasons = Vec::new();
    if label == DecisionLabel::Approve && review.confidence() < REVISE_THRESHOLD {
        reasons.push(DissentReason::LowConfidence);
    }
    if matches!(label, DecisionLabel::Approve | DecisionLabel::Revise) && review.has_blocking_issues()
    {
        reasons.push(DissentReason::BlockingIssues);
    }
    if reasons.is_empty() {
        return None;
    }

    let content = &review.content;
    let (core_concerns, other_concerns) = if content.blocking_issues.is_empty() {
        (content.concerns.clone(), Vec::new())
    } else {
        (
            content
                .blocking_issues
                .iter()
                .map(|issue| issue.description.clone())
                .collect(),
            content.concerns.clone(),
        )
    };

    Some(MinorityReport {
        persona: review.persona,
        confidence: review.confidence(),
        reasons,
        core_concerns,
        recommended_mitigation: content.recommendations.clone(),
        strengths: content.strengths.clone(),
        other_concerns,
    })
}
