use super::runner::{JobContext, blocking};
use crate::schema::{JobError, JobStatus};
use crate::services::{list_children, remove_snapshot, traverse};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ANALYZE_STARTED: &str = "Analysis started";
pub const STRUCTURE_STARTED: &str = "Structure retrieval started";

/// Per-extension counts of every non-ignored file, empty buckets dropped.
pub async fn repository_stats(root: &Path) -> Result<(usize, BTreeMap<String, usize>), JobError> {
    let root = root.to_path_buf();
    let buckets = blocking(move || traverse(&root)).await?;
    let file_stats: BTreeMap<String, usize> = buckets
        .into_iter()
        .filter(|(_, files)| !files.is_empty())
        .map(|(bucket, files)| (bucket, files.len()))
        .collect();
    let total = file_stats.values().sum();
    Ok((total, file_stats))
}

async fn fetch_into_job(ctx: &JobContext, job_id: &str) -> Result<PathBuf, JobError> {
    let job = ctx
        .store
        .update(job_id, &mut |job| job.transition(JobStatus::Cloning, "Cloning repository..."))?;

    let repo_path = ctx.fetcher.fetch(&job.repo_url).await?;

    let attached = ctx.store.update(job_id, &mut |job| {
        job.repo_path = Some(repo_path.clone());
        job.transition(JobStatus::Analyzing, "Analyzing repository structure...")
    });
    if let Err(err) = attached {
        remove_snapshot(&repo_path).await;
        return Err(err);
    }
    Ok(repo_path)
}

/// PENDING -> CLONING -> ANALYZING -> COMPLETED with per-extension stats.
pub async fn analyze_repository(ctx: &JobContext, job_id: &str) -> Result<(), JobError> {
    let repo_path = fetch_into_job(ctx, job_id).await?;
    let (total_files, file_stats) = repository_stats(&repo_path).await?;

    ctx.store.update(job_id, &mut |job| {
        job.total_files = Some(total_files);
        job.file_stats = Some(file_stats.clone());
        job.transition(JobStatus::Completed, "Repository analyzed successfully")
    })?;
    tracing::info!(job_id = %job_id, total_files, "repository analyzed");
    Ok(())
}

/// Like [`analyze_repository`] but stores the root listing and keeps the snapshot for exploration.
pub async fn retrieve_structure(ctx: &JobContext, job_id: &str) -> Result<(), JobError> {
    let repo_path = fetch_into_job(ctx, job_id).await?;
    let structure = blocking(move || list_children(&repo_path, "")).await??;

    ctx.store.update(job_id, &mut |job| {
        job.structure = Some(structure.clone());
        job.transition(JobStatus::Completed, "Repository structure retrieved successfully")
    })?;
    Ok(())
}
