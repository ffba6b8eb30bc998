//! Pipeline steps and per-step progress records

use crate::run::entities::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed, linear pipeline: `expand → review → aggregate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepName {
    Expand,
    Review,
    Aggregate,
}

impl StepName {
    /// Execution order.
    pub const PIPELINE: [StepName; 3] = [StepName::Expand, StepName::Review, StepName::Aggregate];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Expand => "expand",
            StepName::Review => "review",
            StepName::Aggregate => "aggregate",
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress record for one (run, step) pair.
///
/// Written before and after every step so a crashed run shows exactly which
/// steps finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProgress {
    pub run_id: RunId,
    pub step: StepName,
    pub status: StepStatus,
    /// 1-based attempt counter within the current delivery
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl StepProgress {
    pub fn started(run_id: RunId, step: StepName, attempt: u32, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            step,
            status: StepStatus::Running,
            attempt,
            started_at: now,
            finished_at: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = StepStatus::Completed;
        self.finished_at = Some(now);
    }

    pub fn fail(&mut self, now: DateTime<Utc>, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.finished_at = Some(now);
        self.metadata
            .insert("error".to_string(), serde_json::Value::String(error.into()));
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}
