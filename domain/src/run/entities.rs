//! Run entity and its value objects

use crate::core::error::{DomainError, ErrorClass};
use crate::core::model::ModelParams;
use crate::run::proposal::Proposal;
use crate::run::step::StepName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque run identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Lifecycle status of a run. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Whether `self -> next` is allowed.
    ///
    /// `running -> running` is accepted so a redelivered job can re-enter a
    /// run a crashed worker left behind.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Queued, RunStatus::Running)
                | (RunStatus::Queued, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }

    /// Whether a stored run in `self` may be replaced by one in `next`.
    ///
    /// Terminal rows are final, so a writer holding a stale copy cannot
    /// move a run backwards.
    pub fn admits_update_to(&self, next: RunStatus) -> bool {
        (*self == next && !self.is_terminal()) || self.can_transition_to(next)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a run evaluates a fresh idea or revises a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Initial,
    Revision,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Initial => "initial",
            RunKind::Revision => "revision",
        }
    }
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Schema and prompt-set versions stamped onto runs and steps for audit.
///
/// Opaque strings: they are propagated, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTags {
    pub schema: String,
    pub prompt_set: String,
}

impl VersionTags {
    pub fn new(schema: impl Into<String>, prompt_set: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            prompt_set: prompt_set.into(),
        }
    }
}

impl Default for VersionTags {
    fn default() -> Self {
        Self::new("1", "v1")
    }
}

/// What the run was asked to evaluate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    /// The brief idea (for revisions, the root idea of the lineage)
    pub idea: String,
    /// Free-form context forwarded to the expand step
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra_context: serde_json::Map<String, serde_json::Value>,
    /// Revised proposal supplied by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_proposal: Option<Proposal>,
    /// Notes describing what changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_notes: Option<String>,
}

impl RunInput {
    pub fn idea(idea: impl Into<String>) -> Self {
        Self {
            idea: idea.into(),
            ..Default::default()
        }
    }

    pub fn with_extra_context(mut self, context: serde_json::Map<String, serde_json::Value>) -> Self {
        self.extra_context = context;
        self
    }

    pub fn has_edits(&self) -> bool {
        self.edited_proposal.is_some()
            || self
                .edit_notes
                .as_deref()
                .is_some_and(|notes| !notes.trim().is_empty())
    }
}

/// Terminal error payload recorded on a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub class: ErrorClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepName>,
    pub message: String,
}

impl RunFailure {
    pub fn new(class: ErrorClass, step: Option<StepName>, message: impl Into<String>) -> Self {
        Self {
            class,
            step,
            message: message.into(),
        }
    }
}

/// One end-to-end execution of the pipeline for one proposal version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub status: RunStatus,
    pub kind: RunKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<RunId>,
    pub input: RunInput,
    pub params: ModelParams,
    pub versions: VersionTags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Create a queued initial run.
    pub fn new_initial(
        input: RunInput,
        params: ModelParams,
        versions: VersionTags,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RunId::new(),
            status: RunStatus::Queued,
            kind: RunKind::Initial,
            parent_run_id: None,
            input,
            params,
            versions,
            failure: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    /// Create a queued revision of `parent`.
    ///
    /// The parent must be completed and the input must carry an edited
    /// proposal or edit notes.
    pub fn new_revision(
        parent: &Run,
        input: RunInput,
        params: ModelParams,
        versions: VersionTags,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if parent.status != RunStatus::Completed {
            return Err(DomainError::ParentNotCompleted {
                parent: parent.id.to_string(),
                status: parent.status.to_string(),
            });
        }
        if !input.has_edits() {
            return Err(DomainError::EmptyRevision);
        }

        let mut run = Self::new_initial(input, params, versions, now);
        run.kind = RunKind::Revision;
        run.parent_run_id = Some(parent.id);
        Ok(run)
    }

    fn transition(&mut self, next: RunStatus, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Move to `running`. Re-entering a running run keeps the original start time.
    pub fn mark_running(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(RunStatus::Running, now)?;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        Ok(())
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(RunStatus::Completed, now)?;
        self.finished_at = Some(now);
        Ok(())
    }

    pub fn mark_failed(&mut self, failure: RunFailure, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(RunStatus::Failed, now)?;
        self.failure = Some(failure);
        self.finished_at = Some(now);
        Ok(())
    }

    pub fn is_revision(&self) -> bool {
        self.kind == RunKind::Revision
    }

    /// Failed with an error that redelivery can never fix.
    pub fn has_terminal_failure(&self) -> bool {
        self.status == RunStatus::Failed
            && self
                .failure
                .as_ref()
                .is_none_or(|failure| failure.class.is_terminal())
    }
}
