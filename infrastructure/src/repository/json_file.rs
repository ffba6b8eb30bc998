//! JSON-file run repository
//!
//! The whole store is one JSON document. Every mutation rewrites it through
//! a temporary file and a rename, so a crash leaves either the old or the
//! new document on disk, never a torn one.

use super::tables::{RunTables, STORE_VERSION};
use async_trait::async_trait;
use council_application::{InsertOutcome, RepositoryError, RunRepository};
use council_domain::{Decision, PersonaReview, ProposalVersion, Run, RunId, StepProgress};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// File-backed [`RunRepository`] so revisions and diffs work across CLI invocations.
pub struct JsonFileRunRepository {
    path: PathBuf,
    tables: Mutex<RunTables>,
}

impl JsonFileRunRepository {
    /// Open the store at `path`, creating an empty one if the file is absent.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();

        let tables = match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let tables: RunTables = serde_json::from_str(&text).map_err(|e| {
                    RepositoryError::Storage(format!("{} is not a run store: {}", path.display(), e))
                })?;
                if tables.version != STORE_VERSION {
                    return Err(RepositoryError::Storage(format!(
                        "{} has store version {}, expected {}",
                        path.display(),
                        tables.version,
                        STORE_VERSION
                    )));
                }
                debug!(path = %path.display(), runs = tables.runs.len(), "Run store loaded");
                tables
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Creating new run store");
                RunTables::default()
            }
            Err(e) => {
                return Err(RepositoryError::Storage(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, tables: &RunTables) -> Result<(), RepositoryError> {
        let storage = |e: std::io::Error| {
            RepositoryError::Storage(format!("Cannot write {}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(storage)?;
        }

        let json = serde_json::to_vec_pretty(tables)
            .map_err(|e| RepositoryError::Storage(format!("Cannot serialize run store: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(storage)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(storage)
    }

    /// Apply `change` and persist if it succeeded.
    ///
    /// On a failed write the in-memory tables are rolled back so memory and
    /// disk never disagree.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut RunTables) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let before = tables.clone();
        let result = change(&mut tables)?;
        if let Err(e) = self.persist(&tables).await {
            *tables = before;
            return Err(e);
        }
        Ok(result)
    }
}

#[async_trait]
impl RunRepository for JsonFileRunRepository {
    async fn create_run(&self, run: &Run) -> Result<(), RepositoryError> {
        self.mutate(|t| t.create_run(run)).await
    }

    async fn get_run(&self, id: RunId) -> Result<Option<Run>, RepositoryError> {
        Ok(self.tables.lock().await.get_run(id))
    }

    async fn update_run(&self, run: &Run) -> Result<(), RepositoryError> {
        self.mutate(|t| t.update_run(run)).await
    }

    async fn save_proposal(
        &self,
        proposal: &ProposalVersion,
    ) -> Result<InsertOutcome, RepositoryError> {
        self.mutate(|t| t.save_proposal(proposal)).await
    }

    async fn get_proposal(&self, run_id: RunId) -> Result<Option<ProposalVersion>, RepositoryError> {
        Ok(self.tables.lock().await.get_proposal(run_id))
    }

    async fn insert_review(&self, review: &PersonaReview) -> Result<InsertOutcome, RepositoryError> {
        self.mutate(|t| t.insert_review(review)).await
    }

    async fn list_reviews(&self, run_id: RunId) -> Result<Vec<PersonaReview>, RepositoryError> {
        Ok(self.tables.lock().await.list_reviews(run_id))
    }

    async fn save_decision(
        &self,
        run_id: RunId,
        decision: &Decision,
    ) -> Result<InsertOutcome, RepositoryError> {
        self.mutate(|t| t.save_decision(run_id, decision)).await
    }

    async fn get_decision(&self, run_id: RunId) -> Result<Option<Decision>, RepositoryError> {
        Ok(self.tables.lock().await.get_decision(run_id))
    }

    async fn upsert_step(&self, progress: &StepProgress) -> Result<(), RepositoryError> {
        self.mutate(|t| t.upsert_step(progress)).await
    }

    async fn list_steps(&self, run_id: RunId) -> Result<Vec<StepProgress>, RepositoryError> {
        Ok(self.tables.lock().await.list_steps(run_id))
    }

    async fn list_runs(&self) -> Result<Vec<Run>, RepositoryError> {
        Ok(self.tables.lock().await.list_runs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use council_domain::{
        DecisionAggregator, DropPolicy, PersonaRoster, Proposal, RunInput, StepName, VersionTags,
        ModelParams,
    };

    fn run() -> Run {
        Run::new_initial(
            RunInput::idea("Shared shopping lists"),
            ModelParams::default(),
            VersionTags::default(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("runs.json");

        let run = run();
        {
            let repo = JsonFileRunRepository::open(&path).await.unwrap();
            repo.create_run(&run).await.unwrap();
            repo.save_proposal(&ProposalVersion::new(run.id, Proposal::default(), Utc::now()))
                .await
                .unwrap();
            repo.upsert_step(&StepProgress::started(run.id, StepName::Expand, 1, Utc::now()))
                .await
                .unwrap();
            let decision = DecisionAggregator::new(PersonaRoster::default(), DropPolicy::default())
                .aggregate(&[]);
            repo.save_decision(run.id, &decision).await.unwrap();
        }

        let reopened = JsonFileRunRepository::open(&path).await.unwrap();
        let aggregate = reopened.load_aggregate(run.id).await.unwrap().unwrap();
        assert_eq!(aggregate.run, run);
        assert!(aggregate.proposal.is_some());
        assert!(aggregate.decision.is_some());
        assert_eq!(aggregate.steps.len(), 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRunRepository::open(dir.path().join("runs.json"))
            .await
            .unwrap();
        assert!(repo.list_runs().await.unwrap().is_empty());
        // Nothing is written until the first mutation
        assert!(!repo.path().exists());
    }

    #[tokio::test]
    async fn test_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            JsonFileRunRepository::open(&path).await,
            Err(RepositoryError::Storage(_))
        ));

        std::fs::write(&path, r#"{"version": 99}"#).unwrap();
        assert!(matches!(
            JsonFileRunRepository::open(&path).await,
            Err(RepositoryError::Storage(msg)) if msg.contains("99")
        ));
    }

    #[tokio::test]
    async fn test_failed_insert_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.json");
        let repo = JsonFileRunRepository::open(&path).await.unwrap();
        let run = run();
        repo.create_run(&run).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();

        assert!(repo.create_run(&run).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), written);
    }
}
