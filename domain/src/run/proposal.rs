//! Structured proposal produced by the expand step

use crate::diff::FieldDiff;
use crate::run::entities::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The structured expansion of a brief idea.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub problem_statement: String,
    pub solution: String,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub non_goals: Vec<String>,
}

impl Proposal {
    pub fn field_text(&self, field: ProposalField) -> String {
        match field {
            ProposalField::ProblemStatement => self.problem_statement.clone(),
            ProposalField::Solution => self.solution.clone(),
            ProposalField::Assumptions => self.assumptions.join("\n"),
            ProposalField::NonGoals => self.non_goals.join("\n"),
        }
    }

    /// Render as Markdown-ish text for prompts and console output.
    pub fn render(&self) -> String {
        let mut out = format!(
            "## Problem\n{}\n\n## Solution\n{}\n",
            self.problem_statement.trim(),
            self.solution.trim()
        );
        if !self.assumptions.is_empty() {
            out.push_str("\n## Assumptions\n");
            for item in &self.assumptions {
                out.push_str(&format!("- {}\n", item));
            }
        }
        if !self.non_goals.is_empty() {
            out.push_str("\n## Non-goals\n");
            for item in &self.non_goals {
                out.push_str(&format!("- {}\n", item));
            }
        }
        out
    }
}

/// The diffable sections of a [`Proposal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalField {
    ProblemStatement,
    Solution,
    Assumptions,
    NonGoals,
}

impl ProposalField {
    pub const ALL: [ProposalField; 4] = [
        ProposalField::ProblemStatement,
        ProposalField::Solution,
        ProposalField::Assumptions,
        ProposalField::NonGoals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalField::ProblemStatement => "problem_statement",
            ProposalField::Solution => "solution",
            ProposalField::Assumptions => "assumptions",
            ProposalField::NonGoals => "non_goals",
        }
    }
}

impl std::fmt::Display for ProposalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The proposal a run evaluated. One per run, immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalVersion {
    pub run_id: RunId,
    pub proposal: Proposal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_from_parent: Option<Vec<FieldDiff>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProposalVersion {
    pub fn new(run_id: RunId, proposal: Proposal, created_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            proposal,
            diff_from_parent: None,
            edit_notes: None,
            created_at,
        }
    }

    pub fn with_parent_diff(mut self, diff: Vec<FieldDiff>) -> Self {
        self.diff_from_parent = Some(diff);
        self
    }

    pub fn with_edit_notes(mut self, notes: Option<String>) -> Self {
        self.edit_notes = notes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_fields_join_lines() {
        let proposal = Proposal {
            problem_statement: "Users lose work offline".to_string(),
            solution: "Local-first cache".to_string(),
            assumptions: vec!["SQLite available".to_string(), "Single user".to_string()],
            non_goals: vec![],
        };
        assert_eq!(
            proposal.field_text(ProposalField::Assumptions),
            "SQLite available\nSingle user"
        );
        assert_eq!(proposal.field_text(ProposalField::NonGoals), "");
    }

    #[test]
    fn test_render_skips_empty_lists() {
        let proposal = Proposal {
            problem_statement: "P".to_string(),
            solution: "S".to_string(),
            ..Default::default()
        };
        let rendered = proposal.render();
        assert!(rendered.contains("## Problem\nP"));
        assert!(!rendered.contains("Assumptions"));
    }
}
