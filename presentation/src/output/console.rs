//! Console output formatter for council results

use crate::output::formatter::OutputFormatter;
use colored::{ColoredString, Colorize};
use council_domain::{
    ConfigIssue, Decision, DecisionLabel, DissentReason, FieldStatus, PersonaReview, ReviewOrigin,
    RunAggregate, RunDiff, RunRelationship, RunStatus, Severity,
};

/// Formats council results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format a run with everything stored for it
    pub fn format_run(aggregate: &RunAggregate) -> String {
        let run = &aggregate.run;
        let mut output = String::new();

        output.push_str(&Self::header("Council Review"));
        output.push('\n');

        output.push_str(&format!("{} {}\n", "Run:".cyan().bold(), run.id));
        output.push_str(&format!(
            "{} {} ({})\n",
            "Status:".cyan().bold(),
            Self::status(run.status),
            run.kind
        ));
        if let Some(parent) = run.parent_run_id {
            output.push_str(&format!("{} {}\n", "Parent:".cyan().bold(), parent));
        }
        output.push_str(&format!("{} {}\n", "Idea:".cyan().bold(), run.input.idea));
        output.push_str(&format!(
            "{} {} @ {} (prompts {}, schema {})\n",
            "Model:".dimmed(),
            run.params.model,
            run.params.temperature,
            run.versions.prompt_set,
            run.versions.schema
        ));

        if let Some(failure) = &run.failure {
            let step = failure
                .step
                .map(|s| format!(" in {}", s))
                .unwrap_or_default();
            output.push_str(&format!(
                "\n{} [{}{}] {}\n",
                "Failed:".red().bold(),
                failure.class,
                step,
                failure.message
            ));
        }

        if let Some(version) = &aggregate.proposal {
            output.push_str(&Self::section_header("Proposal"));
            output.push_str(&version.proposal.render());
            if let Some(notes) = &version.edit_notes {
                output.push_str(&format!("\n{} {}\n", "Edit notes:".dimmed(), notes));
            }
        }

        if !aggregate.reviews.is_empty() {
            output.push_str(&Self::section_header("Persona Reviews"));
            for review in &aggregate.reviews {
                output.push_str(&Self::review(review));
            }
        }

        if let Some(decision) = &aggregate.decision {
            output.push_str(&Self::section_header("Decision"));
            output.push_str(&Self::format_decision(decision));
        } else if !run.status.is_terminal() {
            let last = aggregate
                .last_completed_step()
                .map(|s| s.as_str())
                .unwrap_or("none");
            output.push_str(&format!(
                "\n{} last completed step: {}\n",
                "In progress,".yellow(),
                last
            ));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format a decision: label, score breakdown and minority reports
    pub fn format_decision(decision: &Decision) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{} {} {}\n",
            decision.label.emoji(),
            Self::label(decision.label),
            format!("(weighted confidence {:.2})", decision.weighted_confidence).dimmed()
        ));
        if decision.vetoed {
            output.push_str(&format!(
                "{}\n",
                "Security veto: a security-critical blocking issue capped the label"
                    .red()
                    .bold()
            ));
        }

        output.push('\n');
        for score in &decision.breakdown {
            let line = match score.confidence {
                Some(confidence) if !score.dropped => format!(
                    "  {:<18} {:>5.2}  weight {:.2}  -> {:.4}",
                    score.persona.display_name(),
                    confidence,
                    score.effective_weight,
                    score.contribution
                ),
                _ => format!(
                    "  {:<18} {}",
                    score.persona.display_name(),
                    "dropped".red()
                ),
            };
            output.push_str(&line);
            output.push('\n');
        }

        for report in &decision.minority_reports {
            let reasons: Vec<&str> = report
                .reasons
                .iter()
                .map(|r| match r {
                    DissentReason::LowConfidence => "low confidence",
                    DissentReason::BlockingIssues => "blocking issues",
                })
                .collect();
            output.push_str(&format!(
                "\n{}\n",
                format!(
                    "── Minority report: {} ({:.2}, {}) ──",
                    report.persona.display_name(),
                    report.confidence,
                    reasons.join(", ")
                )
                .yellow()
                .bold()
            ));
            for concern in &report.core_concerns {
                output.push_str(&format!("  {} {}\n", "!".red(), concern));
            }
            for mitigation in &report.recommended_mitigation {
                output.push_str(&format!("  {} {}\n", "->".cyan(), mitigation));
            }
        }

        output
    }

    /// Format a run comparison
    pub fn format_diff(diff: &RunDiff) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Run Comparison"));
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Old:".cyan().bold(), diff.run_a));
        output.push_str(&format!("{} {}\n", "New:".cyan().bold(), diff.run_b));
        let relationship = match diff.relationship {
            RunRelationship::ParentChild { .. } => "parent and revision".to_string(),
            RunRelationship::Siblings { parent } => format!("sibling revisions of {}", parent),
            RunRelationship::Unrelated => "unrelated".to_string(),
        };
        output.push_str(&format!("{} {}\n", "Relationship:".dimmed(), relationship));

        if let Some(delta) = &diff.decision {
            output.push_str(&Self::section_header("Decision"));
            output.push_str(&format!(
                "  {} -> {}  ({:.2} -> {:.2}, {})\n",
                Self::label(delta.old_label),
                Self::label(delta.new_label),
                delta.old_confidence,
                delta.new_confidence,
                Self::signed(delta.delta)
            ));
        }

        if !diff.personas.is_empty() {
            output.push_str(&Self::section_header("Personas"));
            for p in &diff.personas {
                let mut notes = Vec::new();
                if p.reused {
                    notes.push("reused".dimmed().to_string());
                }
                if p.blocking_resolved() {
                    notes.push("blocking resolved".green().to_string());
                }
                if p.blocking_introduced() {
                    notes.push("blocking introduced".red().to_string());
                }
                output.push_str(&format!(
                    "  {:<18} {:.2} -> {:.2}  {}  {}\n",
                    p.persona.display_name(),
                    p.old_confidence,
                    p.new_confidence,
                    Self::signed(p.delta),
                    notes.join(", ")
                ));
            }
        }

        if !diff.fields.is_empty() {
            output.push_str(&Self::section_header("Proposal"));
            for field in &diff.fields {
                let status = match field.status {
                    FieldStatus::Unchanged => "unchanged".dimmed(),
                    FieldStatus::Added => "added".green(),
                    FieldStatus::Removed => "removed".red(),
                    FieldStatus::Modified => "modified".yellow(),
                };
                output.push_str(&format!(
                    "\n{} {}\n",
                    format!("── {} ──", field.field.as_str()).bold(),
                    status
                ));
                for line in field.diff.iter().flatten() {
                    output.push_str(&format!("{}\n", Self::diff_line(line)));
                }
                if field.truncated {
                    output.push_str(&format!("{}\n", "  ... (truncated)".dimmed()));
                }
            }
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format configuration issues, errors first
    pub fn format_issues(issues: &[ConfigIssue]) -> String {
        if issues.is_empty() {
            return format!("{} configuration is valid\n", "v".green());
        }

        let mut sorted: Vec<&ConfigIssue> = issues.iter().collect();
        sorted.sort_by_key(|i| match i.severity {
            Severity::Error => 0,
            Severity::Warning => 1,
        });

        sorted
            .into_iter()
            .map(|issue| match issue.severity {
                Severity::Error => format!("{} {}\n", "error:".red().bold(), issue.message),
                Severity::Warning => format!("{} {}\n", "warning:".yellow().bold(), issue.message),
            })
            .collect()
    }

    fn review(review: &PersonaReview) -> String {
        let mut output = String::new();
        let origin = match review.origin {
            ReviewOrigin::Fresh => String::new(),
            ReviewOrigin::Reused { from_run } => format!(" (reused from {})", from_run),
        };
        output.push_str(&format!(
            "\n{}{}\n",
            format!(
                "── {} {:.2} ──",
                review.persona.display_name(),
                review.confidence()
            )
            .yellow()
            .bold(),
            origin.dimmed()
        ));

        let content = &review.content;
        for strength in &content.strengths {
            output.push_str(&format!("  {} {}\n", "+".green(), strength));
        }
        for concern in &content.concerns {
            output.push_str(&format!("  {} {}\n", "-".yellow(), concern));
        }
        for issue in &content.blocking_issues {
            let marker = if issue.security_critical {
                "BLOCKING (security)"
            } else {
                "BLOCKING"
            };
            output.push_str(&format!("  {} {}\n", marker.red().bold(), issue.description));
        }
        for recommendation in &content.recommendations {
            output.push_str(&format!("  {} {}\n", "->".cyan(), recommendation));
        }
        if let Some(effort) = &content.estimated_effort {
            output.push_str(&format!("  {} {}\n", "effort:".dimmed(), effort));
        }
        output
    }

    fn label(label: DecisionLabel) -> ColoredString {
        let text = label.as_str().to_uppercase();
        match label {
            DecisionLabel::Approve => text.green().bold(),
            DecisionLabel::Revise => text.yellow().bold(),
            DecisionLabel::Reject => text.red().bold(),
        }
    }

    fn status(status: RunStatus) -> ColoredString {
        match status {
            RunStatus::Completed => status.as_str().green(),
            RunStatus::Failed => status.as_str().red(),
            _ => status.as_str().yellow(),
        }
    }

    fn signed(delta: f64) -> ColoredString {
        let text = format!("{:+.2}", delta);
        if delta > 0.0 {
            text.green()
        } else if delta < 0.0 {
            text.red()
        } else {
            text.dimmed()
        }
    }

    fn diff_line(line: &str) -> ColoredString {
        if line.starts_with("+ ") {
            line.green()
        } else if line.starts_with("- ") {
            line.red()
        } else {
            line.normal()
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_run(&self, aggregate: &RunAggregate) -> String {
        Self::format_run(aggregate)
    }

    fn format_diff(&self, diff: &RunDiff) -> String {
        Self::format_diff(diff)
    }

    fn format_issues(&self, issues: &[ConfigIssue]) -> String {
        Self::format_issues(issues)
    }
}
