use super::{AnalysisResult, DirectoryContents, RoastParameters, RoastedFile};
use crate::services::{ExploreError, FetchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Cloning,
    Analyzing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Cloning => "cloning",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// ANALYZING may repeat (once per batch); terminal states go nowhere.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Cloning | Analyzing | Failed)
                | (Cloning, Analyzing | Failed)
                | (Analyzing, Analyzing | Completed | Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Explore(#[from] ExploreError),
    #[error("Job not found")]
    NotFound { job_id: String },
    #[error("Repository not cloned or structure not retrieved")]
    MissingSnapshot,
    #[error("No files selected for analysis. Use /select endpoint first.")]
    NoSelection,
    #[error("No paths selected for analysis. Use /select endpoint first.")]
    NoPathSelection,
    #[error("illegal job transition from {from} to {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
    #[error("Job is still running. Current status: {status}")]
    InFlight { status: JobStatus },
    #[error("LLM_API_KEY environment variable not set")]
    MissingCredential,
    #[error("background task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for JobError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// One tracked unit of work. Mutated only through [`crate::services::JobStore::update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub repo_url: String,
    /// Set iff the fetch succeeded and the snapshot has not been reclaimed.
    #[serde(skip)]
    pub repo_path: Option<PathBuf>,
    pub structure: Option<DirectoryContents>,
    pub total_files: Option<usize>,
    pub file_stats: Option<BTreeMap<String, usize>>,
    pub selected_paths: Option<Vec<String>>,
    pub file_paths: Option<Vec<String>>,
    pub total_batches: usize,
    pub completed_batches: usize,
    /// Files processed by the current batch run, missing ones included.
    pub completed_files: usize,
    pub analysis_results: Option<BTreeMap<String, AnalysisResult>>,
    pub roasted_files: Option<Vec<RoastedFile>>,
    pub summary: Option<String>,
    pub parameters: Option<RoastParameters>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(repo_url: impl Into<String>, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            message: message.into(),
            repo_url: repo_url.into(),
            repo_path: None,
            structure: None,
            total_files: None,
            file_stats: None,
            selected_paths: None,
            file_paths: None,
            total_batches: 0,
            completed_batches: 0,
            completed_files: 0,
            analysis_results: None,
            roasted_files: None,
            summary: None,
            parameters: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn transition(&mut self, next: JobStatus, message: impl Into<String>) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.set_message(message);
        Ok(())
    }

    /// Progress note that keeps the current status.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.touch();
    }

    pub fn fail(&mut self, message: impl Into<String>, error: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed, message)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Re-arms a finished job for a follow-up run.
    pub fn begin_run(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        if !self.status.is_terminal() {
            return Err(JobError::InFlight {
                status: self.status,
            });
        }
        self.status = JobStatus::Pending;
        self.error = None;
        self.set_message(message);
        Ok(())
    }

    pub fn snapshot(&self) -> Result<&Path, JobError> {
        self.repo_path.as_deref().ok_or(JobError::MissingSnapshot)
    }

    pub fn take_snapshot(&mut self) -> Option<PathBuf> {
        let path = self.repo_path.take();
        if path.is_some() {
            self.touch();
        }
        path
    }

    /// Later entries win on key collisions; earlier keys are never dropped.
    pub fn merge_results(&mut self, results: BTreeMap<String, AnalysisResult>) {
        self.analysis_results
            .get_or_insert_with(BTreeMap::new)
            .extend(results);
        self.touch();
    }
}
