//! Scripted port doubles shared by the use case tests.

use crate::ports::job_queue::{Delivery, JobQueue, QueueError};
use crate::ports::reviewer_client::{
    CompletionInput, CompletionRequest, ReviewerClient, ReviewerError, StructuredResult,
};
use crate::ports::run_repository::{InsertOutcome, RepositoryError, RunRepository};
use async_trait::async_trait;
use council_domain::{
    BlockingIssue, Decision, JobMessage, PersonaId, PersonaReview, Proposal, ProposalVersion, Run,
    RunId, ReviewContent, StepProgress,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

pub(crate) fn sample_proposal() -> Proposal {
    Proposal {
        problem_statement: "Field staff lose edits when the connection drops".to_string(),
        solution: "Cache edits locally and sync when back online".to_string(),
        assumptions: vec!["Devices have local storage".to_string()],
        non_goals: vec!["Real-time collaboration".to_string()],
    }
}

/// Review content with the given confidence, optionally with one blocking issue.
pub(crate) fn review_content(confidence: f64, blocking: bool) -> ReviewContent {
    ReviewContent {
        confidence,
        strengths: vec!["Clear problem".to_string()],
        concerns: if blocking {
            vec!["Conflict resolution is unspecified".to_string()]
        } else {
            vec![]
        },
        recommendations: vec!["Add a conflict policy".to_string()],
        blocking_issues: if blocking {
            vec![BlockingIssue::new("No conflict resolution strategy")]
        } else {
            vec![]
        },
        ..Default::default()
    }
}

// ==================== Reviewer ====================

/// Reviewer client that answers from per-persona scripts.
///
/// Unscripted calls fall back to [`sample_proposal`] for expands and to a
/// clean review at the default confidence for reviews.
pub(crate) struct ScriptedReviewer {
    default_confidence: f64,
    delay: Mutex<Option<Duration>>,
    expands: Mutex<VecDeque<Result<Proposal, ReviewerError>>>,
    reviews: Mutex<HashMap<PersonaId, VecDeque<Result<ReviewContent, ReviewerError>>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedReviewer {
    pub(crate) fn new() -> Self {
        Self::with_default_confidence(0.85)
    }

    pub(crate) fn with_default_confidence(confidence: f64) -> Self {
        Self {
            default_confidence: confidence,
            delay: Mutex::new(None),
            expands: Mutex::new(VecDeque::new()),
            reviews: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long inside every call.
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn script_expand(&self, result: Result<Proposal, ReviewerError>) {
        self.expands.lock().unwrap().push_back(result);
    }

    pub(crate) fn script_review(&self, persona: PersonaId, result: Result<ReviewContent, ReviewerError>) {
        self.reviews
            .lock()
            .unwrap()
            .entry(persona)
            .or_default()
            .push_back(result);
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn expand_requests(&self) -> Vec<CompletionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.persona.is_none())
            .collect()
    }

    pub(crate) fn review_requests(&self) -> Vec<CompletionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.persona.is_some())
            .collect()
    }

    pub(crate) fn review_calls(&self, persona: PersonaId) -> usize {
        self.review_requests()
            .iter()
            .filter(|r| r.persona.as_ref().is_some_and(|p| p.id == persona))
            .count()
    }

    /// Personas in the order they were first asked.
    pub(crate) fn review_order(&self) -> Vec<PersonaId> {
        let mut order = Vec::new();
        for request in self.review_requests() {
            if let Some(spec) = request.persona
                && !order.contains(&spec.id)
            {
                order.push(spec.id);
            }
        }
        order
    }
}

#[async_trait]
impl ReviewerClient for ScriptedReviewer {
    async fn complete(&self, request: &CompletionRequest) -> Result<StructuredResult, ReviewerError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match (&request.persona, &request.input) {
            (Some(spec), _) => {
                let scripted = self
                    .reviews
                    .lock()
                    .unwrap()
                    .get_mut(&spec.id)
                    .and_then(|queue| queue.pop_front());
                scripted
                    .unwrap_or_else(|| Ok(review_content(self.default_confidence, false)))
                    .map(StructuredResult::Review)
            }
            (None, CompletionInput::ApplyEdits { parent, notes }) => {
                let scripted = self.expands.lock().unwrap().pop_front();
                scripted
                    .unwrap_or_else(|| {
                        let mut revised = parent.clone();
                        revised.solution = format!("{}\n{}", parent.solution, notes);
                        Ok(revised)
                    })
                    .map(StructuredResult::Proposal)
            }
            (None, _) => {
                let scripted = self.expands.lock().unwrap().pop_front();
                scripted
                    .unwrap_or_else(|| Ok(sample_proposal()))
                    .map(StructuredResult::Proposal)
            }
        }
    }
}

// ==================== Repository ====================

#[derive(Default)]
struct Tables {
    runs: Vec<Run>,
    proposals: HashMap<RunId, ProposalVersion>,
    reviews: Vec<PersonaReview>,
    decisions: HashMap<RunId, Decision>,
    steps: Vec<StepProgress>,
}

/// In-memory repository with a switch to simulate storage outages.
#[derive(Default)]
pub(crate) struct MemoryRepository {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn step_rows(&self, run_id: RunId) -> Vec<StepProgress> {
        let tables = self.tables.lock().unwrap();
        tables
            .steps
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("database unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RunRepository for MemoryRepository {
    async fn create_run(&self, run: &Run) -> Result<(), RepositoryError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.runs.iter().any(|r| r.id == run.id) {
            return Err(RepositoryError::Duplicate(run.id.to_string()));
        }
        tables.runs.push(run.clone());
        Ok(())
    }

    async fn get_run(&self, id: RunId) -> Result<Option<Run>, RepositoryError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn update_run(&self, run: &Run) -> Result<(), RepositoryError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        match tables.runs.iter_mut().find(|r| r.id == run.id) {
            Some(stored) if !stored.status.admits_update_to(run.status) => Err(
                RepositoryError::Conflict(format!("{} is {}", run.id, stored.status)),
            ),
            Some(stored) => {
                *stored = run.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(run.id.to_string())),
        }
    }

    async fn save_proposal(&self, proposal: &ProposalVersion) -> Result<InsertOutcome, RepositoryError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.proposals.contains_key(&proposal.run_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        tables.proposals.insert(proposal.run_id, proposal.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_proposal(&self, run_id: RunId) -> Result<Option<ProposalVersion>, RepositoryError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().proposals.get(&run_id).cloned())
    }

    async fn insert_review(&self, review: &PersonaReview) -> Result<InsertOutcome, RepositoryError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables
            .reviews
            .iter()
            .any(|r| r.run_id == review.run_id && r.persona == review.persona)
        {
            return Ok(InsertOutcome::AlreadyExists);
        }
        tables.reviews.push(review.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn list_reviews(&self, run_id: RunId) -> Result<Vec<PersonaReview>, RepositoryError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .reviews
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn save_decision(&self, run_id: RunId, decision: &Decision) -> Result<InsertOutcome, RepositoryError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.decisions.contains_key(&run_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        tables.decisions.insert(run_id, decision.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_decision(&self, run_id: RunId) -> Result<Option<Decision>, RepositoryError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().decisions.get(&run_id).cloned())
    }

    async fn upsert_step(&self, progress: &StepProgress) -> Result<(), RepositoryError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        match tables
            .steps
            .iter_mut()
            .find(|s| s.run_id == progress.run_id && s.step == progress.step)
        {
            Some(row) => *row = progress.clone(),
            None => tables.steps.push(progress.clone()),
        }
        Ok(())
    }

    async fn list_steps(&self, run_id: RunId) -> Result<Vec<StepProgress>, RepositoryError> {
        self.check()?;
        let mut steps = self.step_rows(run_id);
        steps.sort_by_key(|s| s.step);
        Ok(steps)
    }

    async fn list_runs(&self) -> Result<Vec<Run>, RepositoryError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().runs.clone())
    }
}

// ==================== Queue ====================

/// Queue double that hands out pushed deliveries once and records every
/// ack, nack and extension. Nacked deliveries are not redelivered.
#[derive(Default)]
pub(crate) struct RecordingQueue {
    next_id: AtomicU64,
    ready: Mutex<VecDeque<Delivery>>,
    acked: Mutex<Vec<u64>>,
    nacked: Mutex<Vec<u64>>,
    extended: Mutex<Vec<(u64, Duration)>>,
    enqueued: Mutex<Vec<JobMessage>>,
    fail_enqueue: AtomicBool,
}

impl RecordingQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make a delivery of `message` available; returns its delivery id.
    pub(crate) fn push(&self, message: &JobMessage, attempt: u32) -> u64 {
        self.push_raw(message.to_json(), attempt)
    }

    pub(crate) fn push_raw(&self, body: impl Into<String>, attempt: u32) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.ready.lock().unwrap().push_back(Delivery {
            id,
            body: body.into(),
            attempt,
        });
        id
    }

    /// Deliveries not yet handed out
    pub(crate) fn ready_len(&self) -> usize {
        self.ready.lock().unwrap().len()
    }

    pub(crate) fn set_fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn acked(&self) -> Vec<u64> {
        self.acked.lock().unwrap().clone()
    }

    pub(crate) fn nacked(&self) -> Vec<u64> {
        self.nacked.lock().unwrap().clone()
    }

    pub(crate) fn extensions(&self) -> Vec<(u64, Duration)> {
        self.extended.lock().unwrap().clone()
    }

    pub(crate) fn enqueued(&self) -> Vec<JobMessage> {
        self.enqueued.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        let next = self.ready.lock().unwrap().pop_front();
        if next.is_none() {
            tokio::time::sleep(wait).await;
        }
        Ok(next)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.acked.lock().unwrap().push(delivery.id);
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.nacked.lock().unwrap().push(delivery.id);
        Ok(())
    }

    async fn extend_deadline(&self, delivery: &Delivery, by: Duration) -> Result<(), QueueError> {
        self.extended.lock().unwrap().push((delivery.id, by));
        Ok(())
    }

    async fn enqueue(&self, message: &JobMessage) -> Result<(), QueueError> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(QueueError::Transport("broker unreachable".to_string()));
        }
        self.enqueued.lock().unwrap().push(message.clone());
        Ok(())
    }
}
