//! Comparison of two loaded runs

use crate::consensus::DecisionLabel;
use crate::diff::line_diff::{DiffLine, diff_lines};
use crate::persona::PersonaId;
use crate::run::aggregate::RunAggregate;
use crate::run::entities::{Run, RunId};
use crate::run::proposal::{Proposal, ProposalField};
use serde::{Deserialize, Serialize};

/// Default cap on rendered diff lines per proposal field.
pub const DEFAULT_MAX_DIFF_LINES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Unchanged,
    Added,
    Removed,
    Modified,
}

/// Textual change of one proposal field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: ProposalField,
    pub status: FieldStatus,
    /// Rendered diff lines; absent when unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Vec<String>>,
    /// Whether `diff` was cut at the line cap
    #[serde(default)]
    pub truncated: bool,
}

/// Score movement of a persona present in both runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaDelta {
    pub persona: PersonaId,
    pub old_confidence: f64,
    pub new_confidence: f64,
    pub delta: f64,
    pub had_blocking_issues: bool,
    pub has_blocking_issues: bool,
    pub had_security_issue: bool,
    pub has_security_issue: bool,
    /// Whether the newer review was carried over instead of recomputed
    pub reused: bool,
}

impl PersonaDelta {
    pub fn blocking_resolved(&self) -> bool {
        self.had_blocking_issues && !self.has_blocking_issues
    }

    pub fn blocking_introduced(&self) -> bool {
        !self.had_blocking_issues && self.has_blocking_issues
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDelta {
    pub old_confidence: f64,
    pub new_confidence: f64,
    pub delta: f64,
    pub old_label: DecisionLabel,
    pub new_label: DecisionLabel,
    pub label_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunRelationship {
    ParentChild { parent: RunId, child: RunId },
    /// Both runs revise the same parent
    Siblings { parent: RunId },
    Unrelated,
}

impl RunRelationship {
    pub fn classify(a: &Run, b: &Run) -> Self {
        if b.parent_run_id == Some(a.id) {
            RunRelationship::ParentChild {
                parent: a.id,
                child: b.id,
            }
        } else if a.parent_run_id == Some(b.id) {
            RunRelationship::ParentChild {
                parent: b.id,
                child: a.id,
            }
        } else if let Some(parent) = a.parent_run_id
            && b.parent_run_id == Some(parent)
        {
            RunRelationship::Siblings { parent }
        } else {
            RunRelationship::Unrelated
        }
    }
}

/// The full comparison of run `a` (old) against run `b` (new).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDiff {
    pub run_a: RunId,
    pub run_b: RunId,
    pub relationship: RunRelationship,
    /// Empty when either run has no proposal
    pub fields: Vec<FieldDiff>,
    pub personas: Vec<PersonaDelta>,
    /// Absent when either run has no decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionDelta>,
}

impl RunDiff {
    pub fn changed_fields(&self) -> Vec<ProposalField> {
        self.fields
            .iter()
            .filter(|f| f.status != FieldStatus::Unchanged)
            .map(|f| f.field)
            .collect()
    }
}

/// Pure run comparison.
///
/// Callers reject diffing a run against itself before calling.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    max_lines_per_field: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self {
            max_lines_per_field: DEFAULT_MAX_DIFF_LINES,
        }
    }
}

impl DiffEngine {
    pub fn new(max_lines_per_field: usize) -> Self {
        Self {
            max_lines_per_field: max_lines_per_field.max(1),
        }
    }

    pub fn diff(&self, a: &RunAggregate, b: &RunAggregate) -> RunDiff {
        let fields = match (&a.proposal, &b.proposal) {
            (Some(old), Some(new)) => self.field_diffs(&old.proposal, &new.proposal),
            _ => Vec::new(),
        };

        let mut personas: Vec<PersonaDelta> = a
            .reviews
            .iter()
            .filter_map(|old| {
                let new = b.review_for(old.persona)?;
                Some(PersonaDelta {
                    persona: old.persona,
                    old_confidence: old.confidence(),
                    new_confidence: new.confidence(),
                    delta: new.confidence() - old.confidence(),
                    had_blocking_issues: old.has_blocking_issues(),
                    has_blocking_issues: new.has_blocking_issues(),
                    had_security_issue: old.has_security_critical_issue(),
                    has_security_issue: new.has_security_critical_issue(),
                    reused: new.is_reused(),
                })
            })
            .collect();
        personas.sort_by_key(|d| d.persona);

        let decision = match (&a.decision, &b.decision) {
            (Some(old), Some(new)) => Some(DecisionDelta {
                old_confidence: old.weighted_confidence,
                new_confidence: new.weighted_confidence,
                delta: new.weighted_confidence - old.weighted_confidence,
                old_label: old.label,
                new_label: new.label,
                label_changed: old.label != new.label,
            }),
            _ => None,
        };

        RunDiff {
            run_a: a.run.id,
            run_b: b.run.id,
            relationship: RunRelationship::classify(&a.run, &b.run),
            fields,
            personas,
            decision,
        }
    }

    /// Per-field diff of two proposals, in field order.
    pub fn field_diffs(&self, old: &Proposal, new: &Proposal) -> Vec<FieldDiff> {
        ProposalField::ALL
            .into_iter()
            .map(|field| self.field_diff(field, &old.field_text(field), &new.field_text(field)))
            .collect()
    }

    fn field_diff(&self, field: ProposalField, old: &str, new: &str) -> FieldDiff {
        let status = match (old.trim().is_empty(), new.trim().is_empty()) {
            _ if old == new => FieldStatus::Unchanged,
            (true, false) => FieldStatus::Added,
            (false, true) => FieldStatus::Removed,
            _ => FieldStatus::Modified,
        };
        if status == FieldStatus::Unchanged {
            return FieldDiff {
                field,
                status,
                diff: None,
                truncated: false,
            };
        }

        let lines = diff_lines(old, new);
        let truncated = lines.len() > self.max_lines_per_field;
        let diff = lines
            .iter()
            .take(self.max_lines_per_field)
            .map(DiffLine::render)
            .collect();
        FieldDiff {
            field,
            status,
            diff: Some(diff),
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{Decision, DecisionLabel};
    use crate::core::model::ModelParams;
    use crate::review::{BlockingIssue, ExecutionMetadata, PersonaReview, ReviewContent};
    use crate::run::entities::{RunInput, VersionTags};
    use crate::run::proposal::ProposalVersion;
    use chrono::Utc;

    fn proposal(solution: &str) -> Proposal {
        Proposal {
            problem_statement: "Onboarding takes two weeks".to_string(),
            solution: solution.to_string(),
            assumptions: vec!["Managers have time".to_string()],
            non_goals: vec![],
        }
    }

    fn aggregate(run: Run, proposal: Proposal) -> RunAggregate {
        let mut agg = RunAggregate::new(run.clone());
        agg.proposal = Some(ProposalVersion::new(run.id, proposal, Utc::now()));
        agg
    }

    fn review(run_id: RunId, persona: PersonaId, confidence: f64, issues: Vec<BlockingIssue>) -> PersonaReview {
        PersonaReview::new(
            run_id,
            persona,
            ReviewContent {
                confidence,
                blocking_issues: issues,
                ..Default::default()
            },
            ExecutionMetadata {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.2,
                retry_count: 0,
                prompt_set: "v1".to_string(),
            },
            Utc::now(),
        )
    }

    fn decision(confidence: f64, label: DecisionLabel) -> Decision {
        Decision {
            weighted_confidence: confidence,
            label,
            vetoed: false,
            breakdown: vec![],
            minority_reports: vec![],
        }
    }

    fn parent_and_child() -> (Run, Run) {
        let now = Utc::now();
        let mut parent = Run::new_initial(
            RunInput::idea("Buddy system"),
            ModelParams::default(),
            VersionTags::default(),
            now,
        );
        parent.mark_running(now).unwrap();
        parent.mark_completed(now).unwrap();
        let input = RunInput {
            edit_notes: Some("Add mentor rotation".to_string()),
            ..RunInput::idea("Buddy system")
        };
        let child = Run::new_revision(
            &parent,
            input,
            ModelParams::default(),
            VersionTags::default(),
            now,
        )
        .unwrap();
        (parent, child)
    }

    #[test]
    fn test_parent_child_diff() {
        let (parent, child) = parent_and_child();
        let mut a = aggregate(parent.clone(), proposal("Assign a buddy"));
        let mut b = aggregate(child.clone(), proposal("Assign a buddy\nRotate mentors monthly"));
        a.reviews = vec![
            review(parent.id, PersonaId::Critic, 0.5, vec![BlockingIssue::new("No owner")]),
            review(parent.id, PersonaId::Architect, 0.9, vec![]),
        ];
        b.reviews = vec![
            review(child.id, PersonaId::Critic, 0.8, vec![]),
            a.reviews[1].reuse_for(child.id, Utc::now()),
        ];
        a.decision = Some(decision(0.7, DecisionLabel::Revise));
        b.decision = Some(decision(0.85, DecisionLabel::Approve));

        let diff = DiffEngine::default().diff(&a, &b);
        assert_eq!(
            diff.relationship,
            RunRelationship::ParentChild {
                parent: parent.id,
                child: child.id
            }
        );
        assert_eq!(diff.changed_fields(), vec![ProposalField::Solution]);
        let solution = &diff.fields[1];
        assert_eq!(solution.status, FieldStatus::Modified);
        assert_eq!(
            solution.diff.as_deref().unwrap(),
            &["  Assign a buddy".to_string(), "+ Rotate mentors monthly".to_string()]
        );
        assert!(diff.fields[0].diff.is_none());

        assert_eq!(diff.personas.len(), 2);
        assert_eq!(diff.personas[0].persona, PersonaId::Architect);
        assert!(diff.personas[0].reused);
        let critic = &diff.personas[1];
        assert!((critic.delta - 0.3).abs() < 1e-9);
        assert!(critic.blocking_resolved());

        let decision = diff.decision.unwrap();
        assert!(decision.label_changed);
        assert_eq!(decision.new_label, DecisionLabel::Approve);
    }

    #[test]
    fn test_reverse_order_still_parent_child() {
        let (parent, child) = parent_and_child();
        let relationship = RunRelationship::classify(&child, &parent);
        assert_eq!(
            relationship,
            RunRelationship::ParentChild {
                parent: parent.id,
                child: child.id
            }
        );
    }

    #[test]
    fn test_unrelated_runs() {
        let now = Utc::now();
        let a = Run::new_initial(RunInput::idea("a"), ModelParams::default(), VersionTags::default(), now);
        let b = Run::new_initial(RunInput::idea("b"), ModelParams::default(), VersionTags::default(), now);
        assert_eq!(RunRelationship::classify(&a, &b), RunRelationship::Unrelated);
    }

    #[test]
    fn test_added_and_removed_fields() {
        let engine = DiffEngine::default();
        let old = Proposal {
            non_goals: vec!["Payroll".to_string()],
            ..proposal("x")
        };
        let new = Proposal {
            assumptions: vec![],
            ..proposal("x")
        };
        let diffs = engine.field_diffs(&old, &new);
        assert_eq!(diffs[2].status, FieldStatus::Removed);
        assert_eq!(diffs[3].status, FieldStatus::Removed);

        let diffs = engine.field_diffs(&new, &old);
        assert_eq!(diffs[2].status, FieldStatus::Added);
    }

    #[test]
    fn test_diff_truncated_at_cap() {
        let engine = DiffEngine::new(50);
        let old = proposal("");
        let long: Vec<String> = (0..80).map(|i| format!("step {}", i)).collect();
        let new = proposal(&long.join("\n"));
        let diffs = engine.field_diffs(&old, &new);
        let solution = &diffs[1];
        assert_eq!(solution.status, FieldStatus::Added);
        assert!(solution.truncated);
        assert_eq!(solution.diff.as_ref().unwrap().len(), 50);
    }
}
