//! Job worker
//!
//! Pulls job messages off the queue and drives each one through the
//! [`PipelineExecutor`] on a bounded pool.
//!
//! ```text
//! ┌─────────┐ bounded channel ┌──────────┐ permit ┌────────────────────────────┐
//! │ receive │────────────────►│ dispatch │───────►│ guard → execute → ack/nack │
//! └─────────┘                 └──────────┘ spawn  │   └─ extend deadline tick   │
//!                                                 └────────────────────────────┘
//! ```
//!
//! Reception runs in its own task and hands deliveries to the dispatcher over
//! a channel holding `max_concurrency` messages, so a full pool never stalls
//! the transport receive loop. The dispatcher takes a pool permit per job.
//! While a job runs its ack deadline is extended every
//! `ack_deadline - extend_margin`.
//!
//! | Outcome | Queue action |
//! |---------|--------------|
//! | malformed body, unknown run | ack |
//! | run already completed or terminally failed | ack |
//! | repository unavailable during the guard | nack |
//! | pipeline completed / terminal failure recorded | ack |
//! | cancelled by shutdown | nack |
//! | retryable failure, deliveries left | nack |
//! | retryable failure on the last allowed delivery | record fatal, ack |
//!
//! On shutdown the worker stops receiving, nacks deliveries still waiting for
//! a permit, gives in-flight jobs `shutdown_grace` to finish, then cancels
//! them. Cancelled jobs are nacked and resume from their persisted steps on
//! redelivery.

use crate::config::WorkerParams;
use crate::ports::job_queue::{Delivery, JobQueue, QueueError};
use crate::use_cases::pipeline_executor::{PipelineError, PipelineExecutor, RunOutcome};
use council_domain::{ErrorClass, JobMessage, RunFailure, RunId, RunStatus};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Worker pool closed")]
    PoolClosed,
}

/// What happened to one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Pipeline finished, or had already finished
    Completed,
    /// Terminal failure recorded on the run
    Failed,
    /// Nacked for redelivery
    Redelivered,
    /// Acked without running: the run was already terminal
    Skipped,
    /// Acked without running: malformed message or unknown run
    Discarded,
}

/// Counters for one [`JobWorker::run`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub received: usize,
    pub completed: usize,
    pub failed: usize,
    pub redelivered: usize,
    pub skipped: usize,
    pub discarded: usize,
    /// Jobs whose task panicked
    pub crashed: usize,
}

impl WorkerReport {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Completed => self.completed += 1,
            Disposition::Failed => self.failed += 1,
            Disposition::Redelivered => self.redelivered += 1,
            Disposition::Skipped => self.skipped += 1,
            Disposition::Discarded => self.discarded += 1,
        }
    }

    fn record_joined(&mut self, joined: Result<Disposition, tokio::task::JoinError>) {
        match joined {
            Ok(disposition) => self.record(disposition),
            Err(e) => {
                error!(error = %e, "Job task crashed");
                self.crashed += 1;
            }
        }
    }
}

#[derive(Clone)]
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    executor: Arc<PipelineExecutor>,
    params: WorkerParams,
}

impl JobWorker {
    pub fn new(queue: Arc<dyn JobQueue>, executor: Arc<PipelineExecutor>, params: WorkerParams) -> Self {
        Self {
            queue,
            executor,
            params,
        }
    }

    /// Consume the queue until `shutdown` is cancelled or the queue closes.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<WorkerReport, WorkerError> {
        let capacity = self.params.max_concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(capacity));
        let (tx, mut rx) = mpsc::channel(capacity);
        let receiver = tokio::spawn(self.clone().receive_loop(tx, shutdown.clone()));
        let jobs = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut report = WorkerReport::default();

        info!(
            max_concurrency = self.params.max_concurrency,
            ack_deadline_secs = self.params.ack_deadline.as_secs(),
            "Worker started"
        );

        let mut pending = None;
        loop {
            while let Some(joined) = tasks.try_join_next() {
                report.record_joined(joined);
            }

            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                delivery = rx.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };
            report.received += 1;

            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    pending = Some(delivery);
                    break;
                }
                permit = semaphore.clone().acquire_owned() => {
                    permit.map_err(|_| WorkerError::PoolClosed)?
                }
            };

            let worker = self.clone();
            let token = jobs.child_token();
            tasks.spawn(async move {
                let _permit = permit;
                worker.handle(delivery, token).await
            });
        }

        // Deliveries that never got a permit go back to the queue
        let receive_result = match receiver.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Receive task crashed");
                Ok(())
            }
        };
        rx.close();
        if let Some(delivery) = pending {
            self.nack(&delivery).await;
            report.redelivered += 1;
        }
        while let Ok(delivery) = rx.try_recv() {
            self.nack(&delivery).await;
            report.received += 1;
            report.redelivered += 1;
        }

        if !tasks.is_empty() {
            info!(
                in_flight = tasks.len(),
                grace_secs = self.params.shutdown_grace.as_secs(),
                "Waiting for in-flight jobs"
            );
        }
        let grace = tokio::time::sleep(self.params.shutdown_grace);
        tokio::pin!(grace);
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(joined) => report.record_joined(joined),
                    None => break,
                },
                _ = &mut grace, if !jobs.is_cancelled() => {
                    warn!(in_flight = tasks.len(), "Shutdown grace elapsed, cancelling jobs");
                    jobs.cancel();
                }
            }
        }

        info!(?report, "Worker stopped");
        receive_result?;
        Ok(report)
    }

    /// Pull deliveries off the queue into `tx` until shutdown or queue close.
    async fn receive_loop(
        self,
        tx: mpsc::Sender<Delivery>,
        shutdown: CancellationToken,
    ) -> Result<(), WorkerError> {
        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                received = self.queue.receive(self.params.receive_wait) => received,
            };

            let delivery = match received {
                Ok(Some(delivery)) => delivery,
                Ok(None) => continue,
                Err(QueueError::Closed) => {
                    info!("Queue closed, stopping worker");
                    return Ok(());
                }
                Err(e) if e.class() == ErrorClass::Retryable => {
                    warn!(error = %e, "Receive failed, backing off");
                    tokio::time::sleep(self.params.receive_wait).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let slot = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                slot = tx.reserve() => slot.ok(),
            };
            match slot {
                Some(slot) => slot.send(delivery),
                None => {
                    self.nack(&delivery).await;
                    return Ok(());
                }
            }
        }
    }

    /// Process one delivery end to end and settle it with the queue.
    pub async fn handle(&self, delivery: Delivery, cancel: CancellationToken) -> Disposition {
        let message = match JobMessage::from_json(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                warn!(delivery = delivery.id, error = %e, "Discarding malformed job message");
                self.ack(&delivery).await;
                return Disposition::Discarded;
            }
        };
        let run_id = message.run_id;

        match self.executor.repository().get_run(run_id).await {
            Ok(None) => {
                warn!(run_id = %run_id, "Discarding job for unknown run");
                self.ack(&delivery).await;
                return Disposition::Discarded;
            }
            Ok(Some(run)) if run.status == RunStatus::Completed || run.has_terminal_failure() => {
                debug!(run_id = %run_id, status = %run.status, "Run already terminal, acking");
                self.ack(&delivery).await;
                return Disposition::Skipped;
            }
            Ok(Some(_)) => {}
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Run lookup failed, redelivering");
                self.nack(&delivery).await;
                return Disposition::Redelivered;
            }
        }

        info!(
            run_id = %run_id,
            run_type = %message.run_type,
            attempt = delivery.attempt,
            "Processing job"
        );
        let result = self.execute_with_extension(&delivery, run_id, &cancel).await;

        match result {
            // Cancellation comes from shutdown and never counts against the delivery cap
            Err(e) if e == PipelineError::Cancelled || cancel.is_cancelled() => {
                info!(run_id = %run_id, attempt = delivery.attempt, "Job cancelled, redelivering");
                self.nack(&delivery).await;
                Disposition::Redelivered
            }
            Ok(RunOutcome::Completed { .. }) | Ok(RunOutcome::AlreadyCompleted) => {
                self.ack(&delivery).await;
                Disposition::Completed
            }
            Ok(RunOutcome::Failed { .. }) => {
                self.ack(&delivery).await;
                Disposition::Failed
            }
            Err(e) if e.class() == ErrorClass::Retryable => {
                if delivery.attempt < self.params.max_deliveries {
                    warn!(
                        run_id = %run_id,
                        attempt = delivery.attempt,
                        error = %e,
                        "Job failed, redelivering"
                    );
                    self.nack(&delivery).await;
                    return Disposition::Redelivered;
                }
                let failure = RunFailure::new(
                    ErrorClass::Fatal,
                    e.step(),
                    format!("gave up after {} deliveries: {}", delivery.attempt, e),
                );
                self.fail_and_ack(&delivery, run_id, failure).await
            }
            Err(e) => self.fail_and_ack(&delivery, run_id, e.to_failure()).await,
        }
    }

    async fn execute_with_extension(
        &self,
        delivery: &Delivery,
        run_id: RunId,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let interval = self.params.extend_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        let execution = self.executor.run_cancellable(run_id, cancel);
        tokio::pin!(execution);

        loop {
            tokio::select! {
                result = &mut execution => return result,
                _ = ticker.tick() => {
                    match self.queue.extend_deadline(delivery, self.params.ack_deadline).await {
                        Ok(()) => debug!(run_id = %run_id, delivery = delivery.id, "Extended ack deadline"),
                        Err(e) => warn!(run_id = %run_id, error = %e, "Failed to extend ack deadline"),
                    }
                }
            }
        }
    }

    async fn fail_and_ack(&self, delivery: &Delivery, run_id: RunId, failure: RunFailure) -> Disposition {
        match self.executor.record_failure(run_id, failure).await {
            Ok(()) => {
                self.ack(delivery).await;
                Disposition::Failed
            }
            Err(e) => {
                // Leave the message for redelivery so the failure gets recorded later
                error!(run_id = %run_id, error = %e, "Could not record failure");
                self.nack(delivery).await;
                Disposition::Redelivered
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = self.queue.ack(delivery).await {
            warn!(delivery = delivery.id, error = %e, "Ack failed");
        }
    }

    async fn nack(&self, delivery: &Delivery) {
        if let Err(e) = self.queue.nack(delivery).await {
            warn!(delivery = delivery.id, error = %e, "Nack failed");
        }
    }
}
