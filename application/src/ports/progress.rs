//! Pipeline progress port
//!
//! Observability events emitted while a run moves through the pipeline.
//! Implementations live in the presentation layer (progress bars) and the
//! infrastructure layer (JSONL event log). Every method has a no-op default
//! so adapters only implement what they display.

use council_domain::{
    Decision, DroppedPersona, PersonaId, PersonaReview, Run, RunFailure, RunId, StepName,
};
use std::sync::Arc;
use std::time::Duration;

pub trait PipelineProgress: Send + Sync {
    /// Called when a worker starts (or resumes) driving a run
    fn on_run_started(&self, _run: &Run) {}

    fn on_step_started(&self, _run_id: RunId, _step: StepName, _attempt: u32) {}

    fn on_step_completed(&self, _run_id: RunId, _step: StepName, _elapsed: Duration) {}

    /// Called for each failed step attempt; `will_retry` is false on the last one
    fn on_step_failed(
        &self,
        _run_id: RunId,
        _step: StepName,
        _attempt: u32,
        _error: &str,
        _will_retry: bool,
    ) {
    }

    /// Called before the review step with the personas that will be reviewed
    fn on_review_planned(&self, _run_id: RunId, _rerun: &[PersonaId], _reused: &[PersonaId]) {}

    fn on_persona_reviewed(&self, _run_id: RunId, _review: &PersonaReview) {}

    fn on_persona_retry(&self, _run_id: RunId, _persona: PersonaId, _attempt: u32, _error: &str) {}

    fn on_persona_dropped(&self, _run_id: RunId, _dropped: &DroppedPersona) {}

    fn on_decision_recorded(&self, _run_id: RunId, _decision: &Decision) {}

    fn on_run_completed(&self, _run_id: RunId, _decision: &Decision) {}

    fn on_run_failed(&self, _run_id: RunId, _failure: &RunFailure) {}
}

/// No-op progress for when nothing is listening
pub struct NoProgress;

impl PipelineProgress for NoProgress {}

/// Fans every event out to several listeners.
///
/// ```text
/// PipelineExecutor ──► CompositeProgress ──┬──► ProgressReporter (indicatif)
///                                          └──► JsonlPipelineLog (event file)
/// ```
#[derive(Default, Clone)]
pub struct CompositeProgress {
    delegates: Vec<Arc<dyn PipelineProgress>>,
}

impl CompositeProgress {
    pub fn new(delegates: Vec<Arc<dyn PipelineProgress>>) -> Self {
        Self { delegates }
    }

    pub fn push(&mut self, delegate: Arc<dyn PipelineProgress>) {
        self.delegates.push(delegate);
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }
}

/// Delegate a method call to all inner listeners.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        for d in &$self.delegates {
            d.$method($($arg),*);
        }
    };
}

impl PipelineProgress for CompositeProgress {
    fn on_run_started(&self, run: &Run) {
        delegate!(self, on_run_started, run);
    }

    fn on_step_started(&self, run_id: RunId, step: StepName, attempt: u32) {
        delegate!(self, on_step_started, run_id, step, attempt);
    }

    fn on_step_completed(&self, run_id: RunId, step: StepName, elapsed: Duration) {
        delegate!(self, on_step_completed, run_id, step, elapsed);
    }

    fn on_step_failed(
        &self,
        run_id: RunId,
        step: StepName,
        attempt: u32,
        error: &str,
        will_retry: bool,
    ) {
        delegate!(self, on_step_failed, run_id, step, attempt, error, will_retry);
    }

    fn on_review_planned(&self, run_id: RunId, rerun: &[PersonaId], reused: &[PersonaId]) {
        delegate!(self, on_review_planned, run_id, rerun, reused);
    }

    fn on_persona_reviewed(&self, run_id: RunId, review: &PersonaReview) {
        delegate!(self, on_persona_reviewed, run_id, review);
    }

    fn on_persona_retry(&self, run_id: RunId, persona: PersonaId, attempt: u32, error: &str) {
        delegate!(self, on_persona_retry, run_id, persona, attempt, error);
    }

    fn on_persona_dropped(&self, run_id: RunId, dropped: &DroppedPersona) {
        delegate!(self, on_persona_dropped, run_id, dropped);
    }

    fn on_decision_recorded(&self, run_id: RunId, decision: &Decision) {
        delegate!(self, on_decision_recorded, run_id, decision);
    }

    fn on_run_completed(&self, run_id: RunId, decision: &Decision) {
        delegate!(self, on_run_completed, run_id, decision);
    }

    fn on_run_failed(&self, run_id: RunId, failure: &RunFailure) {
        delegate!(self, on_run_failed, run_id, failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingProgress {
        steps: Mutex<Vec<StepName>>,
    }

    impl PipelineProgress for CountingProgress {
        fn on_step_started(&self, _run_id: RunId, step: StepName, _attempt: u32) {
            self.steps.lock().unwrap().push(step);
        }
    }

    #[test]
    fn test_composite_fans_out() {
        let a = Arc::new(CountingProgress::default());
        let b = Arc::new(CountingProgress::default());
        let composite = CompositeProgress::new(vec![a.clone(), b.clone(), Arc::new(NoProgress)]);

        composite.on_step_started(RunId::new(), StepName::Review, 1);

        assert_eq!(*a.steps.lock().unwrap(), vec![StepName::Review]);
        assert_eq!(*b.steps.lock().unwrap(), vec![StepName::Review]);
    }
}
