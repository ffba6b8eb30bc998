//! Pipeline executor
//!
//! Drives one run through `expand → review → aggregate`.
//!
//! Every step is idempotent on the run id. Before producing anything a step
//! looks for what it would write (the proposal, a persona's review, the
//! decision) and reuses it, so a redelivered job resumes where the previous
//! delivery stopped and never duplicates a record.
//!
//! Each step attempt runs under the step timeout and the job's cancellation
//! token. Every write is a single insert under a uniqueness rule, so a
//! cancelled attempt never leaves half a record behind. The review step stores
//! each persona's review as it lands; an attempt that times out mid-pass keeps
//! them and the next attempt only asks the personas still missing.

use crate::config::{CouncilConfig, PipelineParams, RetryPolicy};
use crate::ports::progress::{NoProgress, PipelineProgress};
use crate::ports::reviewer_client::{CompletionInput, CompletionRequest, ReviewerClient, ReviewerError};
use crate::ports::run_repository::{InsertOutcome, RepositoryError, RunRepository};
use crate::use_cases::persona_reviewer::{PersonaReviewer, ReviewContext};
use crate::use_cases::review_orchestrator::{ReviewOrchestrator, ReviewPassError};
use chrono::Utc;
use council_domain::{
    Decision, DecisionAggregator, DiffEngine, DomainError, ErrorClass, PersonaId, PersonaSpec,
    Proposal, ProposalVersion, RevisionPlanner, Run, RunFailure, RunId, RunKind, RunStatus,
    StepName, StepProgress,
};
use serde_json::{Map, Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("{step} step failed: {source}")]
    Reviewer {
        step: StepName,
        #[source]
        source: ReviewerError,
    },

    #[error("{step} step timed out after {}s", .timeout.as_secs())]
    StepTimeout { step: StepName, timeout: Duration },

    #[error("Job exceeded its {}s budget before {step}", .budget.as_secs())]
    JobTimeout { step: StepName, budget: Duration },

    #[error("Cancelled")]
    Cancelled,

    #[error("Parent proposal missing for revision of {0}")]
    MissingParent(RunId),

    #[error("Pipeline finished without a decision for {0}")]
    MissingDecision(RunId),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::Reviewer { source, .. } => source.class(),
            PipelineError::StepTimeout { .. }
            | PipelineError::JobTimeout { .. }
            | PipelineError::Cancelled => ErrorClass::Retryable,
            PipelineError::Repository(e) => e.class(),
            PipelineError::RunNotFound(_)
            | PipelineError::MissingParent(_)
            | PipelineError::MissingDecision(_)
            | PipelineError::Domain(_) => ErrorClass::Fatal,
        }
    }

    pub fn step(&self) -> Option<StepName> {
        match self {
            PipelineError::Reviewer { step, .. }
            | PipelineError::StepTimeout { step, .. }
            | PipelineError::JobTimeout { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Failure payload stored on the run.
    pub fn to_failure(&self) -> RunFailure {
        RunFailure::new(self.class(), self.step(), self.to_string())
    }

    fn in_step(self, step: StepName) -> Self {
        match self {
            PipelineError::Reviewer { source, .. } => PipelineError::Reviewer { step, source },
            other => other,
        }
    }
}

/// How a call to [`PipelineExecutor::run`] ended without an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The pipeline finished in this call
    Completed { decision: Decision },
    /// The run was already completed before this call
    AlreadyCompleted,
    /// The run is failed with a terminal error (now or before this call)
    Failed { failure: RunFailure },
}

/// What earlier steps hand to later ones within one execution
#[derive(Default)]
struct StepState {
    proposal: Option<Proposal>,
    decision: Option<Decision>,
}

type StepMetadata = Map<String, Value>;

pub struct PipelineExecutor {
    client: Arc<dyn ReviewerClient>,
    repository: Arc<dyn RunRepository>,
    orchestrator: ReviewOrchestrator,
    aggregator: DecisionAggregator,
    planner: RevisionPlanner,
    diff: DiffEngine,
    params: PipelineParams,
    retry: RetryPolicy,
    progress: Arc<dyn PipelineProgress>,
}

impl PipelineExecutor {
    pub fn new(
        client: Arc<dyn ReviewerClient>,
        repository: Arc<dyn RunRepository>,
        config: &CouncilConfig,
    ) -> Self {
        let reviewer = PersonaReviewer::new(client.clone(), config.retry.clone());
        Self {
            client,
            repository,
            orchestrator: ReviewOrchestrator::new(reviewer, config.review.concurrent),
            aggregator: DecisionAggregator::new(config.roster.clone(), config.review.drop_policy),
            planner: RevisionPlanner::new(config.roster.clone())
                .with_threshold(config.revision.rerun_threshold),
            diff: DiffEngine::new(config.diff.max_lines_per_field),
            params: config.pipeline.clone(),
            retry: config.retry.clone(),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn PipelineProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn repository(&self) -> &Arc<dyn RunRepository> {
        &self.repository
    }

    pub async fn run(&self, run_id: RunId) -> Result<RunOutcome, PipelineError> {
        self.run_cancellable(run_id, &CancellationToken::new()).await
    }

    /// Execute (or resume) the run.
    ///
    /// Terminal failures are recorded on the run and reported as
    /// [`RunOutcome::Failed`]. A retryable failure that outlives the step
    /// attempts is returned as `Err` with the run left `running`, for the
    /// caller to redeliver.
    pub async fn run_cancellable(
        &self,
        run_id: RunId,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let started = Instant::now();
        let mut run = self.load_run(run_id).await?;
        if let Some(outcome) = settled(&run) {
            debug!(run_id = %run_id, status = %run.status, "Run already settled");
            return Ok(outcome);
        }

        run.mark_running(Utc::now())?;
        if let Some(outcome) = self.store_transition(&run).await? {
            return Ok(outcome);
        }
        self.progress.on_run_started(&run);
        info!(run_id = %run_id, kind = %run.kind, "Executing run");

        let mut state = StepState::default();
        for step in StepName::PIPELINE {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            if started.elapsed() >= self.params.job_timeout {
                warn!(run_id = %run_id, step = %step, "Job timeout reached between steps");
                return Err(PipelineError::JobTimeout {
                    step,
                    budget: self.params.job_timeout,
                });
            }

            match self.execute_step(&run, step, &mut state, cancel).await {
                Ok(()) => {}
                Err(error) if error.class().is_terminal() => {
                    let failure = error.to_failure();
                    self.record_failure(run_id, failure.clone()).await?;
                    return Ok(RunOutcome::Failed { failure });
                }
                Err(error) => return Err(error),
            }
        }

        let decision = state
            .decision
            .ok_or(PipelineError::MissingDecision(run_id))?;

        // Another delivery may have settled the run while this one worked
        let mut run = self.load_run(run_id).await?;
        if let Some(outcome) = settled(&run) {
            warn!(run_id = %run_id, status = %run.status, "Run settled elsewhere, not completing");
            return Ok(outcome);
        }
        run.mark_completed(Utc::now())?;
        if let Some(outcome) = self.store_transition(&run).await? {
            warn!(run_id = %run_id, "Run settled elsewhere, not completing");
            return Ok(outcome);
        }
        self.progress.on_run_completed(run_id, &decision);
        info!(
            run_id = %run_id,
            label = %decision.label,
            weighted_confidence = decision.weighted_confidence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run completed"
        );
        Ok(RunOutcome::Completed { decision })
    }

    /// Mark the run failed with `failure`.
    ///
    /// A run that is already terminal is left untouched.
    pub async fn record_failure(&self, run_id: RunId, failure: RunFailure) -> Result<(), PipelineError> {
        let mut run = self.load_run(run_id).await?;
        if run.status.is_terminal() {
            return Ok(());
        }
        warn!(
            run_id = %run_id,
            class = %failure.class,
            step = ?failure.step,
            message = %failure.message,
            "Run failed"
        );
        run.mark_failed(failure.clone(), Utc::now())?;
        if self.store_transition(&run).await?.is_none() {
            self.progress.on_run_failed(run_id, &failure);
        }
        Ok(())
    }

    async fn load_run(&self, run_id: RunId) -> Result<Run, PipelineError> {
        self.repository
            .get_run(run_id)
            .await?
            .ok_or(PipelineError::RunNotFound(run_id))
    }

    /// Write `run`, or return the outcome of the stored row when it has
    /// already been settled by someone else.
    async fn store_transition(&self, run: &Run) -> Result<Option<RunOutcome>, PipelineError> {
        match self.repository.update_run(run).await {
            Ok(()) => Ok(None),
            Err(RepositoryError::Conflict(reason)) => {
                debug!(run_id = %run.id, %reason, "Run update refused");
                let stored = self.load_run(run.id).await?;
                match settled(&stored) {
                    Some(outcome) => Ok(Some(outcome)),
                    None => Err(RepositoryError::Conflict(reason).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn execute_step(
        &self,
        run: &Run,
        step: StepName,
        state: &mut StepState,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let max_attempts = self.params.max_step_attempts.max(1);
        let mut attempt = 1;
        loop {
            let mut row = StepProgress::started(run.id, step, attempt, Utc::now());
            self.repository.upsert_step(&row).await?;
            self.progress.on_step_started(run.id, step, attempt);
            let started = Instant::now();

            let result = match step {
                StepName::Expand => self.expand(run, state, cancel).await,
                StepName::Review => self.review(run, state, cancel).await,
                StepName::Aggregate => self.aggregate(run, state).await,
            };

            let error = match result {
                Ok(metadata) => {
                    row.metadata.extend(metadata);
                    row.complete(Utc::now());
                    self.repository.upsert_step(&row).await?;
                    self.progress.on_step_completed(run.id, step, started.elapsed());
                    return Ok(());
                }
                Err(error) => error.in_step(step),
            };

            let will_retry = error.class() == ErrorClass::Retryable
                && !matches!(error, PipelineError::Cancelled)
                && attempt < max_attempts;
            row.fail(Utc::now(), error.to_string());
            self.repository.upsert_step(&row).await?;
            self.progress
                .on_step_failed(run.id, step, attempt, &error.to_string(), will_retry);

            if !will_retry {
                return Err(error);
            }

            let backoff = self.retry.backoff_for(attempt - 1);
            warn!(
                run_id = %run.id,
                step = %step,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Step failed, retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
            attempt += 1;
        }
    }

    /// Run `work` under the step timeout and the cancellation token.
    async fn guarded<T, F>(&self, step: StepName, cancel: &CancellationToken, work: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        let timeout = self.params.step_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = tokio::time::timeout(timeout, work) => match result {
                Ok(result) => result,
                Err(_) => Err(PipelineError::StepTimeout { step, timeout }),
            },
        }
    }

    // ==================== Steps ====================

    async fn expand(
        &self,
        run: &Run,
        state: &mut StepState,
        cancel: &CancellationToken,
    ) -> Result<StepMetadata, PipelineError> {
        if let Some(existing) = self.repository.get_proposal(run.id).await? {
            debug!(run_id = %run.id, "Reusing stored proposal");
            state.proposal = Some(existing.proposal);
            return Ok(metadata([("reused", json!(true))]));
        }

        let parent = match (run.kind, run.parent_run_id) {
            (RunKind::Revision, Some(parent_id)) => Some(
                self.repository
                    .get_proposal(parent_id)
                    .await?
                    .ok_or(PipelineError::MissingParent(run.id))?
                    .proposal,
            ),
            (RunKind::Revision, None) => return Err(PipelineError::MissingParent(run.id)),
            (RunKind::Initial, _) => None,
        };

        let proposal = match (&parent, &run.input.edited_proposal) {
            (Some(_), Some(edited)) => edited.clone(),
            (Some(parent), None) => {
                let notes = run.input.edit_notes.clone().unwrap_or_default();
                let request = CompletionRequest::expand(
                    CompletionInput::ApplyEdits {
                        parent: parent.clone(),
                        notes,
                    },
                    run.params.clone(),
                    run.versions.prompt_set.clone(),
                );
                self.complete_proposal(&request, cancel).await?
            }
            (None, _) => {
                let request = CompletionRequest::expand(
                    CompletionInput::Idea {
                        idea: run.input.idea.clone(),
                        extra_context: run.input.extra_context.clone(),
                    },
                    run.params.clone(),
                    run.versions.prompt_set.clone(),
                );
                self.complete_proposal(&request, cancel).await?
            }
        };

        let mut version = ProposalVersion::new(run.id, proposal, Utc::now())
            .with_edit_notes(run.input.edit_notes.clone());
        if let Some(parent) = &parent {
            let diffs = self.diff.field_diffs(parent, &version.proposal);
            version = version.with_parent_diff(diffs);
        }

        let stored = match self.repository.save_proposal(&version).await? {
            InsertOutcome::Inserted => version.proposal,
            InsertOutcome::AlreadyExists => self
                .repository
                .get_proposal(run.id)
                .await?
                .map(|p| p.proposal)
                .unwrap_or(version.proposal),
        };
        state.proposal = Some(stored);
        Ok(metadata([("reused", json!(false))]))
    }

    async fn complete_proposal(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Proposal, PipelineError> {
        let step = StepName::Expand;
        self.guarded(step, cancel, async {
            self.client
                .complete(request)
                .await
                .and_then(|result| result.into_proposal())
                .map_err(|source| PipelineError::Reviewer { step, source })
        })
        .await
    }

    async fn review(
        &self,
        run: &Run,
        state: &mut StepState,
        cancel: &CancellationToken,
    ) -> Result<StepMetadata, PipelineError> {
        let proposal = match state.proposal.clone() {
            Some(proposal) => proposal,
            None => self
                .repository
                .get_proposal(run.id)
                .await?
                .map(|p| p.proposal)
                .ok_or_else(|| DomainError::InvalidProposal("review before expand".to_string()))?,
        };

        let existing: Vec<PersonaId> = self
            .repository
            .list_reviews(run.id)
            .await?
            .iter()
            .map(|r| r.persona)
            .collect();

        let mut reused = Vec::new();
        let planned: Vec<PersonaId> = match (run.kind, run.parent_run_id) {
            (RunKind::Revision, Some(parent_id)) => {
                let parent_reviews = self.repository.list_reviews(parent_id).await?;
                let plan = self.planner.plan(&parent_reviews, &proposal);
                for review in &plan.reuse {
                    reused.push(review.persona);
                    if !existing.contains(&review.persona) {
                        self.repository
                            .insert_review(&review.reuse_for(run.id, Utc::now()))
                            .await?;
                    }
                }
                info!(
                    run_id = %run.id,
                    rerun = ?plan.rerun,
                    reused = ?reused,
                    "Revision plan"
                );
                plan.rerun
            }
            _ => self.aggregator.roster().ids(),
        };

        let pending: Vec<PersonaSpec> = self
            .aggregator
            .roster()
            .subset(&planned)
            .into_iter()
            .filter(|spec| !existing.contains(&spec.id))
            .cloned()
            .collect();
        self.progress.on_review_planned(run.id, &planned, &reused);

        if pending.is_empty() {
            return Ok(metadata([
                ("requested", json!(0)),
                ("reused", json!(reused)),
            ]));
        }

        let ctx = ReviewContext {
            run_id: run.id,
            proposal: &proposal,
            params: &run.params,
            prompt_set: &run.versions.prompt_set,
        };
        let step = StepName::Review;
        let batch = self
            .guarded(step, cancel, async {
                self.orchestrator
                    .review(&pending, ctx, self.progress.as_ref(), self.repository.as_ref())
                    .await
                    .map_err(|e| match e {
                        ReviewPassError::Reviewer(source) => PipelineError::Reviewer { step, source },
                        ReviewPassError::Store(e) => PipelineError::Repository(e),
                    })
            })
            .await?;

        Ok(metadata([
            ("requested", json!(batch.metadata.requested)),
            ("reviewed", json!(batch.metadata.reviewed)),
            ("retries", json!(batch.metadata.total_retries)),
            ("concurrent", json!(batch.metadata.concurrent)),
            ("reused", json!(reused)),
            ("dropped", json!(batch.dropped)),
        ]))
    }

    async fn aggregate(&self, run: &Run, state: &mut StepState) -> Result<StepMetadata, PipelineError> {
        if let Some(existing) = self.repository.get_decision(run.id).await? {
            debug!(run_id = %run.id, "Reusing stored decision");
            state.decision = Some(existing);
            return Ok(metadata([("reused", json!(true))]));
        }

        let reviews = self.repository.list_reviews(run.id).await?;
        let decision = self.aggregator.aggregate(&reviews);

        let decision = match self.repository.save_decision(run.id, &decision).await? {
            InsertOutcome::Inserted => decision,
            InsertOutcome::AlreadyExists => self
                .repository
                .get_decision(run.id)
                .await?
                .unwrap_or(decision),
        };
        self.progress.on_decision_recorded(run.id, &decision);
        info!(
            run_id = %run.id,
            label = %decision.label,
            weighted_confidence = decision.weighted_confidence,
            vetoed = decision.vetoed,
            minority_reports = decision.minority_reports.len(),
            "Decision recorded"
        );

        let meta = metadata([
            ("reused", json!(false)),
            ("label", json!(decision.label)),
            ("dropped", json!(decision.dropped_personas())),
        ]);
        state.decision = Some(decision);
        Ok(meta)
    }
}

/// Outcome of a run that needs no more work, `None` while it is open.
fn settled(run: &Run) -> Option<RunOutcome> {
    match run.status {
        RunStatus::Completed => Some(RunOutcome::AlreadyCompleted),
        RunStatus::Failed => {
            let failure = run.failure.clone().unwrap_or_else(|| {
                RunFailure::new(ErrorClass::Fatal, None, "failed without details")
            });
            Some(RunOutcome::Failed { failure })
        }
        RunStatus::Queued | RunStatus::Running => None,
    }
}

fn metadata<const N: usize>(entries: [(&str, Value); N]) -> StepMetadata {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
