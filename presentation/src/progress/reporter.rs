//! Progress reporting for pipeline execution

use colored::Colorize;
use council_application::PipelineProgress;
use council_domain::{
    Decision, DroppedPersona, PersonaId, PersonaReview, Run, RunFailure, RunId, StepName,
};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Bars belonging to one run
struct RunBars {
    step: ProgressBar,
    review: Option<ProgressBar>,
}

/// Reports progress during pipeline execution with progress bars
///
/// One spinner per run tracks the current step; the review step adds a bar
/// that fills as personas finish.
pub struct ProgressReporter {
    multi: MultiProgress,
    runs: Mutex<HashMap<RunId, RunBars>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            runs: Mutex::new(HashMap::new()),
        }
    }

    fn step_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn review_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("  {spinner:.yellow} {prefix:.bold.yellow} [{bar:30.yellow/dim}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("●○-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    fn step_display_name(step: StepName) -> &'static str {
        match step {
            StepName::Expand => "Expanding idea",
            StepName::Review => "Council review",
            StepName::Aggregate => "Aggregating decision",
        }
    }

    fn short_id(run_id: RunId) -> String {
        run_id.to_string().chars().take(8).collect()
    }

    fn with_run(&self, run_id: RunId, f: impl FnOnce(&mut RunBars)) {
        if let Ok(mut runs) = self.runs.lock()
            && let Some(bars) = runs.get_mut(&run_id)
        {
            f(bars);
        }
    }

    fn finish(&self, run_id: RunId, message: String) {
        if let Ok(mut runs) = self.runs.lock()
            && let Some(bars) = runs.remove(&run_id)
        {
            if let Some(review) = bars.review {
                review.finish_and_clear();
            }
            bars.step.finish_with_message(message);
        }
    }

    #[cfg(test)]
    fn review_position(&self, run_id: RunId) -> Option<(u64, Option<u64>)> {
        let runs = self.runs.lock().ok()?;
        let review = runs.get(&run_id)?.review.as_ref()?;
        Some((review.position(), review.length()))
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineProgress for ProgressReporter {
    fn on_run_started(&self, run: &Run) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::step_style());
        pb.set_prefix(format!("Run {}", Self::short_id(run.id)));
        pb.set_message("Starting...");
        pb.enable_steady_tick(Duration::from_millis(120));

        if let Ok(mut runs) = self.runs.lock()
            && let Some(previous) = runs.insert(run.id, RunBars { step: pb, review: None })
        {
            // Redelivered run: drop the bars of the abandoned attempt
            previous.step.finish_and_clear();
            if let Some(review) = previous.review {
                review.finish_and_clear();
            }
        }
    }

    fn on_step_started(&self, run_id: RunId, step: StepName, attempt: u32) {
        self.with_run(run_id, |bars| {
            let name = Self::step_display_name(step);
            if attempt > 1 {
                bars.step
                    .set_message(format!("{} (attempt {})", name, attempt));
            } else {
                bars.step.set_message(format!("{}...", name));
            }
        });
    }

    fn on_step_completed(&self, run_id: RunId, step: StepName, elapsed: Duration) {
        self.with_run(run_id, |bars| {
            if step == StepName::Review
                && let Some(review) = bars.review.take()
            {
                review.finish_and_clear();
            }
            bars.step.println(format!(
                "  {} {} {}",
                "v".green(),
                Self::step_display_name(step),
                format!("({:.1}s)", elapsed.as_secs_f64()).dimmed()
            ));
        });
    }

    fn on_step_failed(
        &self,
        run_id: RunId,
        step: StepName,
        attempt: u32,
        error: &str,
        will_retry: bool,
    ) {
        self.with_run(run_id, |bars| {
            let suffix = if will_retry { ", retrying" } else { "" };
            bars.step.println(format!(
                "  {} {} attempt {} failed{}: {}",
                "x".red(),
                Self::step_display_name(step),
                attempt,
                suffix,
                error
            ));
        });
    }

    fn on_review_planned(&self, run_id: RunId, rerun: &[PersonaId], reused: &[PersonaId]) {
        let pb = self.multi.add(ProgressBar::new(rerun.len() as u64));
        pb.set_style(Self::review_style());
        pb.set_prefix("Personas");
        if reused.is_empty() {
            pb.set_message("reviewing...");
        } else {
            pb.set_message(format!("{} reused from parent", reused.len()));
        }

        let mut pb = Some(pb);
        self.with_run(run_id, |bars| {
            if let Some(old) = bars.review.take() {
                old.finish_and_clear();
            }
            bars.review = pb.take();
        });
        // Unknown run: do not leave an orphan bar on screen
        if let Some(orphan) = pb {
            orphan.finish_and_clear();
        }
    }

    fn on_persona_reviewed(&self, run_id: RunId, review: &PersonaReview) {
        self.with_run(run_id, |bars| {
            if let Some(pb) = &bars.review {
                pb.set_message(format!(
                    "{} {} {:.2}",
                    "v".green(),
                    review.persona.display_name(),
                    review.confidence()
                ));
                pb.inc(1);
            }
        });
    }

    fn on_persona_retry(&self, run_id: RunId, persona: PersonaId, attempt: u32, _error: &str) {
        self.with_run(run_id, |bars| {
            if let Some(pb) = &bars.review {
                pb.set_message(format!(
                    "{} {} retry {}",
                    "~".yellow(),
                    persona.display_name(),
                    attempt
                ));
            }
        });
    }

    fn on_persona_dropped(&self, run_id: RunId, dropped: &DroppedPersona) {
        self.with_run(run_id, |bars| {
            if let Some(pb) = &bars.review {
                pb.println(format!(
                    "  {} {} dropped after {} attempt(s): {}",
                    "x".red(),
                    dropped.persona.display_name(),
                    dropped.attempts,
                    dropped.reason
                ));
                pb.inc(1);
            }
        });
    }

    fn on_run_completed(&self, run_id: RunId, decision: &Decision) {
        self.finish(run_id, format!("{}", decision.summary().green()));
    }

    fn on_run_failed(&self, run_id: RunId, failure: &RunFailure) {
        self.finish(
            run_id,
            format!("{} {}", "failed:".red().bold(), failure.message),
        );
    }
}

/// Simple text-based progress (no fancy UI), for logs and non-terminals
pub struct SimpleProgress;

impl PipelineProgress for SimpleProgress {
    fn on_run_started(&self, run: &Run) {
        eprintln!(
            "{} {} {}",
            "->".cyan(),
            "Run".bold(),
            ProgressReporter::short_id(run.id)
        );
    }

    fn on_step_started(&self, _run_id: RunId, step: StepName, attempt: u32) {
        if attempt > 1 {
            eprintln!(
                "  {} (attempt {})",
                ProgressReporter::step_display_name(step),
                attempt
            );
        } else {
            eprintln!("  {}", ProgressReporter::step_display_name(step));
        }
    }

    fn on_persona_reviewed(&self, _run_id: RunId, review: &PersonaReview) {
        eprintln!(
            "    {} {} {:.2}",
            "v".green(),
            review.persona.display_name(),
            review.confidence()
        );
    }

    fn on_persona_dropped(&self, _run_id: RunId, dropped: &DroppedPersona) {
        eprintln!(
            "    {} {} (dropped: {})",
            "x".red(),
            dropped.persona.display_name(),
            dropped.reason
        );
    }

    fn on_run_completed(&self, _run_id: RunId, decision: &Decision) {
        eprintln!("  {}", decision.summary());
    }

    fn on_run_failed(&self, _run_id: RunId, failure: &RunFailure) {
        eprintln!("  {} {}", "x".red(), failure.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use council_domain::{ExecutionMetadata, ModelParams, ReviewContent, RunInput, VersionTags};

    fn run() -> Run {
        Run::new_initial(
            RunInput::idea("Dark mode"),
            ModelParams::default(),
            VersionTags::default(),
            Utc::now(),
        )
    }

    fn review(run_id: RunId, persona: PersonaId) -> PersonaReview {
        PersonaReview::new(
            run_id,
            persona,
            ReviewContent::with_confidence(0.8),
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
    fn test_review_bar_tracks_personas() {
        let reporter = ProgressReporter::with_draw_target(ProgressDrawTarget::hidden());
        let run = run();

        reporter.on_run_started(&run);
        reporter.on_step_started(run.id, StepName::Review, 1);
        reporter.on_review_planned(
            run.id,
            &[PersonaId::Critic, PersonaId::SecurityGuardian],
            &[PersonaId::Architect],
        );
        reporter.on_persona_reviewed(run.id, &review(run.id, PersonaId::Critic));
        assert_eq!(reporter.review_position(run.id), Some((1, Some(2))));

        reporter.on_persona_dropped(
            run.id,
            &DroppedPersona {
                persona: PersonaId::SecurityGuardian,
                reason: "timeout".to_string(),
                attempts: 3,
            },
        );
        assert_eq!(reporter.review_position(run.id), Some((2, Some(2))));

        reporter.on_step_completed(run.id, StepName::Review, Duration::from_millis(1500));
        assert_eq!(reporter.review_position(run.id), None);
    }

    #[test]
    fn test_events_for_unknown_runs_are_ignored() {
        let reporter = ProgressReporter::with_draw_target(ProgressDrawTarget::hidden());
        let stranger = RunId::new();
        reporter.on_review_planned(stranger, &[PersonaId::Critic], &[]);
        reporter.on_persona_reviewed(stranger, &review(stranger, PersonaId::Critic));
        assert_eq!(reporter.review_position(stranger), None);
    }

    #[test]
    fn test_finished_run_is_forgotten() {
        let reporter = ProgressReporter::with_draw_target(ProgressDrawTarget::hidden());
        let run = run();
        reporter.on_run_started(&run);
        reporter.on_review_planned(run.id, &[PersonaId::Critic], &[]);
        reporter.on_run_failed(
            run.id,
            &RunFailure::new(council_domain::ErrorClass::Fatal, None, "boom"),
        );
        assert!(reporter.runs.lock().unwrap().is_empty());
    }
}
