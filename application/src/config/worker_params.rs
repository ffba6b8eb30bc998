//! Worker parameters: pool size and queue timing.

use std::time::Duration;

/// Job worker control parameters.
///
/// `ack_deadline` mirrors the queue's redelivery deadline. The pipeline's
/// job timeout must not exceed it (see [`CouncilConfig::validate`]).
///
/// [`CouncilConfig::validate`]: crate::config::CouncilConfig::validate
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerParams {
    /// Maximum jobs executing at once
    pub max_concurrency: usize,
    /// Queue redelivery deadline for an unacked delivery
    pub ack_deadline: Duration,
    /// Extend the deadline when less than this much of it remains
    pub extend_margin: Duration,
    /// How long in-flight jobs get to finish after shutdown is requested
    pub shutdown_grace: Duration,
    /// Receive wait per poll of the queue
    pub receive_wait: Duration,
    /// Deliveries after which a still-retryable failure is recorded as fatal
    pub max_deliveries: u32,
}

impl Default for WorkerParams {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            ack_deadline: Duration::from_secs(600),
            extend_margin: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(30),
            receive_wait: Duration::from_secs(1),
            max_deliveries: 5,
        }
    }
}

impl WorkerParams {
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn with_ack_deadline(mut self, deadline: Duration) -> Self {
        self.ack_deadline = deadline;
        self
    }

    pub fn with_extend_margin(mut self, margin: Duration) -> Self {
        self.extend_margin = margin;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_receive_wait(mut self, wait: Duration) -> Self {
        self.receive_wait = wait;
        self
    }

    pub fn with_max_deliveries(mut self, max: u32) -> Self {
        self.max_deliveries = max.max(1);
        self
    }

    /// Interval between deadline extensions.
    ///
    /// Never zero, so a misconfigured margin cannot spin the ticker.
    pub fn extend_interval(&self) -> Duration {
        self.ack_deadline
            .saturating_sub(self.extend_margin)
            .max(Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_interval() {
        let params = WorkerParams::default();
        assert_eq!(params.extend_interval(), Duration::from_secs(540));

        let params = WorkerParams::default()
            .with_ack_deadline(Duration::from_secs(10))
            .with_extend_margin(Duration::from_secs(30));
        assert_eq!(params.extend_interval(), Duration::from_millis(100));
    }
}
