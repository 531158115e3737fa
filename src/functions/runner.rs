use crate::config::Config;
use crate::schema::{JobError, RoastParameters};
use crate::services::{CritiqueEngine, JobStore, RepositoryFetcher, remove_snapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Collaborators every background procedure runs against.
pub struct JobContext {
    pub store: Arc<dyn JobStore>,
    pub fetcher: Arc<dyn RepositoryFetcher>,
    /// `None` when no credential is configured; auto-critique runs then fail at setup.
    pub critic: Option<Arc<dyn CritiqueEngine>>,
    pub config: Config,
}

impl JobContext {
    pub fn critic(&self) -> Result<Arc<dyn CritiqueEngine>, JobError> {
        self.critic.clone().ok_or(JobError::MissingCredential)
    }
}

#[derive(Debug, Clone)]
pub enum Procedure {
    AnalyzeRepository,
    Structure,
    AnalyzePaths,
    AnalyzeBatches { batch_size: usize },
    AutoRoast(RoastParameters),
}

impl Procedure {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AnalyzeRepository => "analyze_repository",
            Self::Structure => "structure",
            Self::AnalyzePaths => "analyze_paths",
            Self::AnalyzeBatches { .. } => "analyze_batches",
            Self::AutoRoast(_) => "auto_roast",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Self::AnalyzeRepository => "Repository analysis failed",
            Self::Structure => "Repository structure retrieval failed",
            Self::AnalyzePaths | Self::AnalyzeBatches { .. } => "Analysis failed",
            Self::AutoRoast(_) => "Auto-critique failed",
        }
    }

    /// Fetching runs own their snapshot until they complete.
    fn discards_snapshot_on_failure(&self) -> bool {
        matches!(self, Self::AnalyzeRepository | Self::Structure)
    }

    async fn run(&self, ctx: &JobContext, job_id: &str) -> Result<(), JobError> {
        match self {
            Self::AnalyzeRepository => super::repository::analyze_repository(ctx, job_id).await,
            Self::Structure => super::repository::retrieve_structure(ctx, job_id).await,
            Self::AnalyzePaths => super::analysis::analyze_paths(ctx, job_id).await,
            Self::AnalyzeBatches { batch_size } => {
                super::analysis::analyze_batches(ctx, job_id, *batch_size).await
            }
            Self::AutoRoast(params) => super::roast::auto_roast(ctx, job_id, params).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub procedure: &'static str,
}

/// Spawns job procedures and keeps their join handles.
pub struct JobRunner {
    ctx: Arc<JobContext>,
    /// Latest run per job, held until joined or aborted.
    tasks: Mutex<HashMap<String, JoinHandle<Result<(), JobError>>>>,
}

impl JobRunner {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self {
            ctx,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<JobContext> {
        &self.ctx
    }

    pub fn dispatch(&self, job_id: &str, procedure: Procedure) -> JobHandle {
        let handle = JobHandle {
            job_id: job_id.to_string(),
            procedure: procedure.name(),
        };

        let ctx = Arc::clone(&self.ctx);
        let id = job_id.to_string();
        let task = tokio::spawn(async move { drive(ctx, id, procedure).await });

        self.tasks.lock().insert(handle.job_id.clone(), task);
        handle
    }

    /// Waits for the latest run of `job_id`. `None` when nothing was dispatched or it was already joined.
    pub async fn join(&self, job_id: &str) -> Option<Result<(), JobError>> {
        let task = self.tasks.lock().remove(job_id)?;
        Some(task.await.unwrap_or_else(|e| Err(JobError::from(e))))
    }

    pub fn abort_all(&self) {
        let mut tasks = self.tasks.lock();
        for (job_id, task) in tasks.drain() {
            if !task.is_finished() {
                tracing::warn!(job_id = %job_id, "aborting in-flight job");
                task.abort();
            }
        }
    }
}

async fn drive(ctx: Arc<JobContext>, job_id: String, procedure: Procedure) -> Result<(), JobError> {
    tracing::info!(job_id = %job_id, procedure = procedure.name(), "job started");

    let outcome = procedure.run(&ctx, &job_id).await;
    match &outcome {
        Ok(()) => tracing::info!(job_id = %job_id, procedure = procedure.name(), "job completed"),
        Err(err) => {
            tracing::error!(job_id = %job_id, procedure = procedure.name(), error = %err, "job failed");
            record_failure(&ctx, &job_id, &procedure, err).await;
        }
    }
    outcome
}

async fn record_failure(ctx: &JobContext, job_id: &str, procedure: &Procedure, err: &JobError) {
    let mut discarded = None;
    let error = err.to_string();
    let updated = ctx.store.update(job_id, &mut |job| {
        job.fail(procedure.failure_message(), error.clone())?;
        if procedure.discards_snapshot_on_failure() {
            discarded = job.take_snapshot();
        }
        Ok(())
    });

    if let Err(e) = updated {
        tracing::warn!(job_id = %job_id, error = %e, "could not record job failure");
    }
    if let Some(path) = discarded {
        remove_snapshot(&path).await;
    }
}

/// Runs a synchronous filesystem walk off the async workers.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, JobError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work).await?)
}
