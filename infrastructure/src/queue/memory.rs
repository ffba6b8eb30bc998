//! In-process job queue with ack deadlines and redelivery
//!
//! ```text
//! enqueue ──► ready (high | normal) ──receive──► leased ──ack──► gone
//!                 ▲                                │
//!                 │◄──── deadline expired ─────────┤
//!                 │                                │
//!              delayed ◄───────── nack ────────────┘
//! ```
//!
//! Each receive hands out a fresh delivery id, so a worker still holding an
//! expired delivery cannot ack the redelivered copy.

use async_trait::async_trait;
use council_application::{Delivery, JobQueue, QueueError};
use council_domain::{JobMessage, JobPriority};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

const DEFAULT_NACK_BACKOFF: Duration = Duration::from_secs(1);

struct Message {
    body: String,
    priority: JobPriority,
    deliveries: u32,
}

struct Lease {
    message: Message,
    deadline: Instant,
}

struct Delayed {
    message: Message,
    ready_at: Instant,
}

#[derive(Default)]
struct QueueState {
    high: VecDeque<Message>,
    normal: VecDeque<Message>,
    delayed: Vec<Delayed>,
    leased: HashMap<u64, Lease>,
    next_delivery_id: u64,
    closed: bool,
}

impl QueueState {
    fn push_ready(&mut self, message: Message) {
        match message.priority {
            JobPriority::High => self.high.push_back(message),
            JobPriority::Normal => self.normal.push_back(message),
        }
    }

    /// Return expired leases and due nacks to the ready queues.
    fn settle_timers(&mut self, now: Instant) {
        let expired: Vec<u64> = self
            .leased
            .iter()
            .filter(|(_, lease)| lease.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(lease) = self.leased.remove(&id) {
                debug!(
                    delivery_id = id,
                    deliveries = lease.message.deliveries,
                    "Ack deadline expired, message will be redelivered"
                );
                self.push_ready(lease.message);
            }
        }

        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delayed)
            .into_iter()
            .partition(|d| d.ready_at <= now);
        self.delayed = waiting;
        for delayed in due {
            self.push_ready(delayed.message);
        }
    }

    fn take_ready(&mut self, now: Instant, ack_deadline: Duration) -> Option<Delivery> {
        self.settle_timers(now);
        let mut message = self.high.pop_front().or_else(|| self.normal.pop_front())?;

        message.deliveries += 1;
        self.next_delivery_id += 1;
        let delivery = Delivery {
            id: self.next_delivery_id,
            body: message.body.clone(),
            attempt: message.deliveries,
        };
        self.leased.insert(
            delivery.id,
            Lease {
                message,
                deadline: now + ack_deadline,
            },
        );
        Some(delivery)
    }

    /// Earliest instant at which a timer moves a message back to ready.
    fn next_wake(&self) -> Option<Instant> {
        let leases = self.leased.values().map(|l| l.deadline);
        let delayed = self.delayed.iter().map(|d| d.ready_at);
        leases.chain(delayed).min()
    }
}

/// Single-process [`JobQueue`] for the CLI and for tests.
///
/// High-priority messages are handed out before normal ones when both are
/// ready. There is no ordering promise beyond that.
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    ack_deadline: Duration,
    nack_backoff: Duration,
}

impl InMemoryJobQueue {
    pub fn new(ack_deadline: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            ack_deadline,
            nack_backoff: DEFAULT_NACK_BACKOFF,
        }
    }

    pub fn with_nack_backoff(mut self, backoff: Duration) -> Self {
        self.nack_backoff = backoff;
        self
    }

    /// Stop handing out messages. Outstanding deliveries can still be settled.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        self.notify.notify_waiters();
    }

    /// Messages waiting to be delivered, including nacked ones in backoff.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.high.len() + s.normal.len() + s.delayed.len())
            .unwrap_or(0)
    }

    /// Deliveries handed out and not yet settled or expired.
    pub fn in_flight(&self) -> usize {
        self.state.lock().map(|s| s.leased.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state
            .lock()
            .map_err(|_| QueueError::Transport("queue state lock poisoned".to_string()))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        let until = Instant::now() + wait;
        loop {
            // Register interest before checking state so an enqueue between
            // the check and the await is not missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = Instant::now();
            let next_wake = {
                let mut state = self.lock()?;
                if state.closed {
                    return Err(QueueError::Closed);
                }
                if let Some(delivery) = state.take_ready(now, self.ack_deadline) {
                    trace!(
                        delivery_id = delivery.id,
                        attempt = delivery.attempt,
                        "Message delivered"
                    );
                    return Ok(Some(delivery));
                }
                state.next_wake()
            };

            if now >= until {
                return Ok(None);
            }
            let sleep_until = next_wake.map_or(until, |wake| wake.min(until));
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(sleep_until) => {}
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        state
            .leased
            .remove(&delivery.id)
            .map(|_| ())
            .ok_or(QueueError::UnknownDelivery(delivery.id))
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        {
            let mut state = self.lock()?;
            let lease = state
                .leased
                .remove(&delivery.id)
                .ok_or(QueueError::UnknownDelivery(delivery.id))?;
            state.delayed.push(Delayed {
                message: lease.message,
                ready_at: Instant::now() + self.nack_backoff,
            });
        }
        // Receivers recompute their wake time to include the new backoff
        self.notify.notify_waiters();
        Ok(())
    }

    async fn extend_deadline(&self, delivery: &Delivery, by: Duration) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        let lease = state
            .leased
            .get_mut(&delivery.id)
            .ok_or(QueueError::UnknownDelivery(delivery.id))?;
        lease.deadline = Instant::now() + by;
        Ok(())
    }

    async fn enqueue(&self, message: &JobMessage) -> Result<(), QueueError> {
        {
            let mut state = self.lock()?;
            if state.closed {
                return Err(QueueError::Closed);
            }
            state.push_ready(Message {
                body: message.to_json(),
                priority: message.priority,
                deliveries: 0,
            });
        }
        debug!(run_id = %message.run_id, priority = message.priority.as_str(), "Job enqueued");
        self.notify.notify_waiters();
        Ok(())
    }
}
