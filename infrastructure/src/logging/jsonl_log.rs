//! JSONL file writer for pipeline events.
//!
//! Each event is serialized as a single JSON line with `type`, `timestamp`
//! and `run_id` fields, appended to the file via a buffered writer.

use council_application::PipelineProgress;
use council_domain::{
    Decision, DroppedPersona, PersonaId, PersonaReview, Run, RunFailure, RunId, StepName,
};
use serde_json::{Value, json};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// JSONL pipeline log that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Appends to an existing file so
/// several invocations can share one log. Flushes on `Drop`.
pub struct JsonlPipelineLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlPipelineLog {
    /// Open (or create) the log at `path`.
    ///
    /// Creates parent directories if they don't exist.
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create pipeline log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open pipeline log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, event_type: &str, run_id: RunId, payload: Value) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let mut record = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        record.insert("type".to_string(), Value::String(event_type.to_string()));
        record.insert("timestamp".to_string(), Value::String(timestamp));
        record.insert("run_id".to_string(), Value::String(run_id.to_string()));

        let Ok(line) = serde_json::to_string(&Value::Object(record)) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            // Flush every line: a crashed worker should still leave a readable log
            let _ = writer.flush();
        }
    }
}

impl PipelineProgress for JsonlPipelineLog {
    fn on_run_started(&self, run: &Run) {
        self.write(
            "run_started",
            run.id,
            json!({
                "kind": run.kind.as_str(),
                "parent_run_id": run.parent_run_id.map(|id| id.to_string()),
                "schema_version": run.versions.schema,
                "prompt_set": run.versions.prompt_set,
            }),
        );
    }

    fn on_step_started(&self, run_id: RunId, step: StepName, attempt: u32) {
        self.write(
            "step_started",
            run_id,
            json!({ "step": step.as_str(), "attempt": attempt }),
        );
    }

    fn on_step_completed(&self, run_id: RunId, step: StepName, elapsed: Duration) {
        self.write(
            "step_completed",
            run_id,
            json!({ "step": step.as_str(), "elapsed_ms": elapsed.as_millis() as u64 }),
        );
    }

    fn on_step_failed(
        &self,
        run_id: RunId,
        step: StepName,
        attempt: u32,
        error: &str,
        will_retry: bool,
    ) {
        self.write(
            "step_failed",
            run_id,
            json!({
                "step": step.as_str(),
                "attempt": attempt,
                "error": error,
                "will_retry": will_retry,
            }),
        );
    }

    fn on_review_planned(&self, run_id: RunId, rerun: &[PersonaId], reused: &[PersonaId]) {
        self.write(
            "review_planned",
            run_id,
            json!({ "rerun": rerun, "reused": reused }),
        );
    }

    fn on_persona_reviewed(&self, run_id: RunId, review: &PersonaReview) {
        self.write(
            "persona_reviewed",
            run_id,
            json!({
                "persona": review.persona,
                "confidence": review.confidence(),
                "blocking_issues": review.content.blocking_issues.len(),
                "reused": review.is_reused(),
                "retry_count": review.execution.retry_count,
            }),
        );
    }

    fn on_persona_retry(&self, run_id: RunId, persona: PersonaId, attempt: u32, error: &str) {
        self.write(
            "persona_retry",
            run_id,
            json!({ "persona": persona, "attempt": attempt, "error": error }),
        );
    }

    fn on_persona_dropped(&self, run_id: RunId, dropped: &DroppedPersona) {
        let payload = serde_json::to_value(dropped).unwrap_or(Value::Null);
        self.write("persona_dropped", run_id, payload);
    }

    fn on_decision_recorded(&self, run_id: RunId, decision: &Decision) {
        self.write(
            "decision_recorded",
            run_id,
            json!({
                "label": decision.label.as_str(),
                "weighted_confidence": decision.weighted_confidence,
                "vetoed": decision.vetoed,
                "minority_reports": decision.minority_reports.len(),
                "dropped_personas": decision.dropped_personas(),
            }),
        );
    }

    fn on_run_completed(&self, run_id: RunId, decision: &Decision) {
        self.write(
            "run_completed",
            run_id,
            json!({ "label": decision.label.as_str() }),
        );
    }

    fn on_run_failed(&self, run_id: RunId, failure: &RunFailure) {
        self.write(
            "run_failed",
            run_id,
            json!({
                "class": failure.class.as_str(),
                "step": failure.step.map(|s| s.as_str()),
                "message": failure.message,
            }),
        );
    }
}

impl Drop for JsonlPipelineLog {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
