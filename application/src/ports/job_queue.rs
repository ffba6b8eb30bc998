//! Job queue port
//!
//! At-least-once delivery with an ack deadline. A delivery that is neither
//! acked nor extended before its deadline is redelivered.

use async_trait::async_trait;
use council_domain::{ErrorClass, JobMessage};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Queue closed")]
    Closed,

    #[error("Unknown or expired delivery: {0}")]
    UnknownDelivery(u64),

    #[error("Queue transport error: {0}")]
    Transport(String),
}

impl QueueError {
    pub fn class(&self) -> ErrorClass {
        match self {
            QueueError::Transport(_) => ErrorClass::Retryable,
            QueueError::Closed | QueueError::UnknownDelivery(_) => ErrorClass::Fatal,
        }
    }
}

/// One delivery of a queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Transport handle, unique per delivery (not per message)
    pub id: u64,
    /// Raw message body
    pub body: String,
    /// 1 on first delivery, incremented on each redelivery
    pub attempt: u32,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Wait up to `wait` for a message. `Ok(None)` on timeout.
    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Remove the message for good.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Hand the message back for redelivery after a transport-chosen backoff.
    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Push the delivery's deadline `by` into the future.
    async fn extend_deadline(&self, delivery: &Delivery, by: Duration) -> Result<(), QueueError>;

    /// Publish a new job.
    async fn enqueue(&self, message: &JobMessage) -> Result<(), QueueError>;
}
