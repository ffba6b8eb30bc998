//! Job message body carried by the queue transport
//!
//! ```json
//! {"run_id": "<uuid>", "run_type": "initial", "priority": "normal",
//!  "payload": {"idea": "...", "extra_context": {}}}
//! ```

use crate::run::entities::{RunId, RunKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    #[default]
    Normal,
    High,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Normal => "normal",
            JobPriority::High => "high",
        }
    }
}

impl std::str::FromStr for JobPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(JobPriority::Normal),
            "high" => Ok(JobPriority::High),
            other => Err(format!("Unknown priority: {}. Valid: normal, high", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    #[serde(default)]
    pub idea: String,
    #[serde(default)]
    pub extra_context: serde_json::Map<String, serde_json::Value>,
}

/// A queued request to drive one run through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub run_id: RunId,
    pub run_type: RunKind,
    #[serde(default)]
    pub priority: JobPriority,
    #[serde(default)]
    pub payload: JobPayload,
}

impl JobMessage {
    pub fn new(run_id: RunId, run_type: RunKind, payload: JobPayload) -> Self {
        Self {
            run_id,
            run_type,
            priority: JobPriority::Normal,
            payload,
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn to_json(&self) -> String {
        // Every field serializes infallibly (strings, enums, JSON maps).
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}
