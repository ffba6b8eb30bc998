//! Queue + repository + worker wired together the way the CLI wires them.

use async_trait::async_trait;
use council_application::{
    CompareRunsUseCase, CompletionInput, CompletionRequest, CouncilConfig, CreateRevisionInput,
    CreateRevisionUseCase, JobWorker, PipelineExecutor, RetryPolicy, ReviewerClient,
    ReviewerError, RunRepository, StaticVersions, StructuredResult, SubmitRunInput,
    SubmitRunUseCase, WorkerReport,
};
use council_domain::{
    BlockingIssue, DecisionLabel, JobPriority, ModelParams, PersonaId, Proposal, ReviewContent,
    RunId, RunStatus,
};
use council_infrastructure::{InMemoryJobQueue, InMemoryRunRepository, JsonFileRunRepository};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Reviewer that approves everything unless told otherwise.
#[derive(Default)]
struct StubReviewer {
    expand_failures: AtomicU32,
    expand_calls: AtomicU32,
    critic_scores: Mutex<VecDeque<(f64, bool)>>,
}

impl StubReviewer {
    fn fail_expand(&self, times: u32) {
        self.expand_failures.store(times, Ordering::SeqCst);
    }

    fn script_critic(&self, confidence: f64, blocking: bool) {
        self.critic_scores
            .lock()
            .unwrap()
            .push_back((confidence, blocking));
    }
}

#[async_trait]
impl ReviewerClient for StubReviewer {
    async fn complete(&self, request: &CompletionRequest) -> Result<StructuredResult, ReviewerError> {
        match &request.input {
            CompletionInput::Idea { idea, .. } => {
                self.expand_calls.fetch_add(1, Ordering::SeqCst);
                let remaining = self.expand_failures.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.expand_failures.store(remaining - 1, Ordering::SeqCst);
                    return Err(ReviewerError::Transport("connection reset".to_string()));
                }
                Ok(StructuredResult::Proposal(Proposal {
                    problem_statement: format!("Users keep asking for {}", idea),
                    solution: format!("Ship {} behind a flag", idea),
                    assumptions: vec!["Demand is real".to_string()],
                    non_goals: vec![],
                }))
            }
            CompletionInput::ApplyEdits { parent, notes } => {
                let mut revised = parent.clone();
                revised.solution = format!("{} ({})", parent.solution, notes);
                Ok(StructuredResult::Proposal(revised))
            }
            CompletionInput::Review { .. } => {
                let persona = request.persona.as_ref().map(|p| p.id);
                let (confidence, blocking) = match persona {
                    Some(PersonaId::Critic) => self
                        .critic_scores
                        .lock()
                        .unwrap()
                        .pop_front()
                        .unwrap_or((0.9, false)),
                    _ => (0.85, false),
                };
                let mut content = ReviewContent::with_confidence(confidence);
                if blocking {
                    content.concerns.push("No rollback plan".to_string());
                    content
                        .blocking_issues
                        .push(BlockingIssue::new("No rollback plan"));
                }
                Ok(StructuredResult::Review(content))
            }
        }
    }
}

struct Harness {
    client: Arc<StubReviewer>,
    repository: Arc<dyn RunRepository>,
    queue: Arc<InMemoryJobQueue>,
    config: CouncilConfig,
    shutdown: CancellationToken,
    worker: JoinHandle<WorkerReport>,
}

impl Harness {
    fn start(client: Arc<StubReviewer>, repository: Arc<dyn RunRepository>, config: CouncilConfig) -> Self {
        let queue = Arc::new(
            InMemoryJobQueue::new(config.worker.ack_deadline)
                .with_nack_backoff(Duration::from_millis(500)),
        );
        let executor = Arc::new(PipelineExecutor::new(
            client.clone(),
            repository.clone(),
            &config,
        ));
        let worker = JobWorker::new(queue.clone(), executor, config.worker.clone());
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let worker = tokio::spawn(async move { worker.run(token).await.unwrap() });

        Self {
            client,
            repository,
            queue,
            config,
            shutdown,
            worker,
        }
    }

    fn submit(&self) -> SubmitRunUseCase {
        SubmitRunUseCase::new(
            self.repository.clone(),
            self.queue.clone(),
            Arc::new(StaticVersions::default()),
            ModelParams::default(),
        )
    }

    async fn wait_terminal(&self, id: RunId) -> RunStatus {
        for _ in 0..600 {
            let run = self.repository.get_run(id).await.unwrap().unwrap();
            if run.status.is_terminal() {
                return run.status;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("run {} never finished", id);
    }

    async fn stop(self) -> WorkerReport {
        self.shutdown.cancel();
        self.worker.await.unwrap()
    }
}

fn test_config() -> CouncilConfig {
    let mut config = CouncilConfig::default();
    config.retry = RetryPolicy::none();
    config.pipeline = config.pipeline.with_max_step_attempts(1);
    config.worker = config
        .worker
        .with_receive_wait(Duration::from_millis(50))
        .with_shutdown_grace(Duration::from_secs(1));
    config
}

#[tokio::test(start_paused = true)]
async fn test_submitted_runs_are_evaluated() {
    let h = Harness::start(
        Arc::new(StubReviewer::default()),
        Arc::new(InMemoryRunRepository::new()),
        test_config(),
    );

    let normal = h
        .submit()
        .execute(SubmitRunInput::new("dark mode"))
        .await
        .unwrap();
    let urgent = h
        .submit()
        .execute(SubmitRunInput::new("export to CSV").with_priority(JobPriority::High))
        .await
        .unwrap();

    assert_eq!(h.wait_terminal(normal.id).await, RunStatus::Completed);
    assert_eq!(h.wait_terminal(urgent.id).await, RunStatus::Completed);

    for id in [normal.id, urgent.id] {
        let aggregate = h.repository.load_aggregate(id).await.unwrap().unwrap();
        assert_eq!(aggregate.reviews.len(), 5);
        assert_eq!(aggregate.steps.len(), 3);
        let decision = aggregate.decision.unwrap();
        assert_eq!(decision.label, DecisionLabel::Approve);
    }

    assert_eq!(h.queue.pending(), 0);
    let report = h.stop().await;
    assert_eq!(report.completed, 2);
    assert_eq!(report.crashed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_redelivered() {
    let client = Arc::new(StubReviewer::default());
    client.fail_expand(1);
    let h = Harness::start(client, Arc::new(InMemoryRunRepository::new()), test_config());

    let run = h
        .submit()
        .execute(SubmitRunInput::new("offline sync"))
        .await
        .unwrap();
    assert_eq!(h.wait_terminal(run.id).await, RunStatus::Completed);
    assert_eq!(h.client.expand_calls.load(Ordering::SeqCst), 2);

    let report = h.stop().await;
    assert_eq!(report.redelivered, 1);
    assert_eq!(report.completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_delivery_cap() {
    let client = Arc::new(StubReviewer::default());
    client.fail_expand(100);
    let mut config = test_config();
    config.worker = config.worker.with_max_deliveries(3);
    let h = Harness::start(client, Arc::new(InMemoryRunRepository::new()), config);

    let run = h
        .submit()
        .execute(SubmitRunInput::new("offline sync"))
        .await
        .unwrap();
    assert_eq!(h.wait_terminal(run.id).await, RunStatus::Failed);

    let failed = h.repository.get_run(run.id).await.unwrap().unwrap();
    let failure = failed.failure.unwrap();
    assert!(failure.message.contains("3 deliveries"), "{}", failure.message);
    assert_eq!(h.client.expand_calls.load(Ordering::SeqCst), 3);
    h.stop().await;
}

// Real time: the file store does blocking I/O, which a paused clock would skip past
#[tokio::test]
async fn test_revision_and_diff_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("runs.json");

    let client = Arc::new(StubReviewer::default());
    client.script_critic(0.4, true);
    client.script_critic(0.9, false);
    let repository: Arc<dyn RunRepository> =
        Arc::new(JsonFileRunRepository::open(&store).await.unwrap());
    let h = Harness::start(client, repository, test_config());

    let parent = h
        .submit()
        .execute(SubmitRunInput::new("team calendars"))
        .await
        .unwrap();
    assert_eq!(h.wait_terminal(parent.id).await, RunStatus::Completed);
    let parent_decision = h.repository.get_decision(parent.id).await.unwrap().unwrap();
    assert!(!parent_decision.minority_reports.is_empty());

    let revise = CreateRevisionUseCase::new(
        h.repository.clone(),
        h.queue.clone(),
        Arc::new(StaticVersions::default()),
        ModelParams::default(),
    );
    let child = revise
        .execute(CreateRevisionInput::new(parent.id).with_notes("add a rollback plan"))
        .await
        .unwrap();
    assert_eq!(h.wait_terminal(child.id).await, RunStatus::Completed);

    let child_reviews = h.repository.list_reviews(child.id).await.unwrap();
    let reused = child_reviews.iter().filter(|r| r.is_reused()).count();
    assert_eq!(child_reviews.len(), 5);
    // Only the low-confidence critic is asked again
    assert_eq!(reused, 4);

    let config = h.config.clone();
    h.stop().await;

    // A fresh process sees the same store
    let reopened: Arc<dyn RunRepository> =
        Arc::new(JsonFileRunRepository::open(&store).await.unwrap());
    let diff = CompareRunsUseCase::new(reopened, &config.diff)
        .execute(parent.id, child.id)
        .await
        .unwrap();
    let critic = diff
        .personas
        .iter()
        .find(|p| p.persona == PersonaId::Critic)
        .unwrap();
    assert!(critic.blocking_resolved());
    assert!(!diff.changed_fields().is_empty());
}
