use super::runner::{JobContext, blocking};
use crate::schema::{AnalysisResult, JobError, JobStatus};
use crate::services::heuristics::{critique_file, read_file_content};
use crate::services::{matching_files, resolve_snapshot_path};
use std::collections::BTreeMap;
use std::path::Path;

pub const MIN_BATCH_SIZE: usize = 5;
pub const MAX_BATCH_SIZE: usize = 50;

async fn analyze_file(path: &Path, max_read_bytes: u64) -> AnalysisResult {
    let content = read_file_content(path, max_read_bytes).await;
    AnalysisResult::file(critique_file(path, &content))
}

/// Critiques every selected path: files directly, directories by their matching files.
pub async fn analyze_paths(ctx: &JobContext, job_id: &str) -> Result<(), JobError> {
    let job = ctx.store.get(job_id)?;
    let root = job.snapshot()?.to_path_buf();
    let paths = job.selected_paths.clone().ok_or(JobError::NoPathSelection)?;

    ctx.store.update(job_id, &mut |job| {
        job.transition(JobStatus::Analyzing, "Analyzing selected paths...")
    })?;

    let max_read_bytes = ctx.config.max_read_bytes;
    let mut results = BTreeMap::new();
    for selected in paths {
        let result = match resolve_snapshot_path(&root, &selected) {
            Some(full) if full.is_file() => analyze_file(&full, max_read_bytes).await,
            Some(full) if full.is_dir() => {
                let walk_root = root.clone();
                let filter = ctx.config.path_analysis_extensions.clone();
                let files = blocking(move || matching_files(&walk_root, &full, Some(&filter))).await?;

                let mut nested = BTreeMap::new();
                for relative in files {
                    let critique = analyze_file(&root.join(&relative), max_read_bytes).await;
                    nested.insert(relative, critique);
                }
                AnalysisResult::Directory { files: nested }
            }
            _ => AnalysisResult::path_not_found(),
        };
        results.insert(selected, result);
    }

    let analyzed = results.len();
    ctx.store.update(job_id, &mut |job| {
        job.merge_results(results.clone());
        job.transition(JobStatus::Completed, "Analysis completed")
    })?;
    tracing::info!(job_id = %job_id, paths = analyzed, "path analysis finished");
    Ok(())
}

/// Critiques the job's file list in fixed-size batches, merging results after each batch.
pub async fn analyze_batches(ctx: &JobContext, job_id: &str, batch_size: usize) -> Result<(), JobError> {
    let batch_size = batch_size.max(1);
    let job = ctx.store.get(job_id)?;
    let root = job.snapshot()?.to_path_buf();
    let files = job.file_paths.clone().ok_or(JobError::NoSelection)?;

    let total_files = files.len();
    let total_batches = total_files.div_ceil(batch_size);

    ctx.store.update(job_id, &mut |job| {
        job.total_batches = total_batches;
        job.completed_batches = 0;
        job.completed_files = 0;
        job.transition(
            JobStatus::Analyzing,
            format!("Processing {total_files} files in {total_batches} batches..."),
        )
    })?;

    let max_read_bytes = ctx.config.max_read_bytes;
    for (index, batch) in files.chunks(batch_size).enumerate() {
        let start = index * batch_size;
        let end = start + batch.len();
        ctx.store.update(job_id, &mut |job| {
            job.transition(
                JobStatus::Analyzing,
                format!(
                    "Processing batch {}/{total_batches} ({}-{end} of {total_files} files)...",
                    index + 1,
                    start + 1
                ),
            )
        })?;

        let mut batch_results = BTreeMap::new();
        for relative in batch {
            match resolve_snapshot_path(&root, relative) {
                Some(full) if full.is_file() => {
                    batch_results.insert(relative.clone(), analyze_file(&full, max_read_bytes).await);
                }
                _ => tracing::debug!(job_id = %job_id, path = %relative, "skipping missing file"),
            }
        }

        ctx.store.update(job_id, &mut |job| {
            job.merge_results(batch_results.clone());
            job.completed_batches = index + 1;
            job.completed_files = end;
            Ok(())
        })?;
        tracing::debug!(job_id = %job_id, batch = index + 1, total_batches, "batch analyzed");
    }

    ctx.store.update(job_id, &mut |job| {
        job.transition(
            JobStatus::Completed,
            format!("Analysis completed. Processed {total_files} files in {total_batches} batches."),
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{JobRunner, Procedure};
    use crate::schema::{JobRecord, ProgressResponse};
    use crate::test_support::{FailingFetcher, context_with, snapshot, write_file};
    use std::sync::Arc;

    fn finished_job(ctx: &JobContext, root: &Path, files: Option<Vec<String>>) -> JobRecord {
        let mut job = JobRecord::new("https://example.org/r", "Structure retrieval started");
        job.repo_path = Some(root.to_path_buf());
        job.transition(JobStatus::Analyzing, "Analyzing repository structure...")
            .unwrap();
        job.transition(JobStatus::Completed, "Repository structure retrieved successfully")
            .unwrap();
        job.selected_paths = files.clone();
        job.file_paths = files;
        ctx.store.insert(job)
    }

    async fn run(ctx: &Arc<JobContext>, job_id: &str, procedure: Procedure) -> Result<(), JobError> {
        let runner = JobRunner::new(Arc::clone(ctx));
        ctx.store
            .update(job_id, &mut |job| job.begin_run("Analysis queued"))
            .unwrap();
        runner.dispatch(job_id, procedure);
        runner.join(job_id).await.unwrap()
    }

    #[tokio::test]
    async fn batches_cover_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<String> = (0..45).map(|i| format!("src/f{i:02}.py")).collect();
        for file in &files {
            write_file(dir.path(), file, "print('hi')\n");
        }
        let ctx = context_with(Arc::new(FailingFetcher::not_found()), None);
        let job = finished_job(&ctx, dir.path(), Some(files.clone()));

        run(&ctx, &job.job_id, Procedure::AnalyzeBatches { batch_size: 20 })
            .await
            .unwrap();

        let job = ctx.store.get(&job.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total_batches, 3);
        assert_eq!(job.completed_batches, 3);
        assert_eq!(job.message, "Analysis completed. Processed 45 files in 3 batches.");
        let results = job.analysis_results.unwrap();
        assert_eq!(results.len(), 45);
        assert!(files.iter().all(|f| matches!(results.get(f), Some(AnalysisResult::File { .. }))));
    }

    #[tokio::test]
    async fn batches_skip_missing_files() {
        let dir = snapshot(&[("a.py", "x = 1"), ("b.py", "import *")]);
        let ctx = context_with(Arc::new(FailingFetcher::not_found()), None);
        let listed = vec!["a.py".to_string(), "gone.py".to_string(), "b.py".to_string()];
        let job = finished_job(&ctx, dir.path(), Some(listed));

        run(&ctx, &job.job_id, Procedure::AnalyzeBatches { batch_size: 5 })
            .await
            .unwrap();

        let results = ctx.store.get(&job.job_id).unwrap().analysis_results.unwrap();
        assert_eq!(results.keys().collect::<Vec<_>>(), ["a.py", "b.py"]);
    }

    #[tokio::test]
    async fn consecutive_batch_runs_merge_results() {
        let dir = snapshot(&[("one.js", "var a = 1;"), ("two.js", "let b = 2;")]);
        let ctx = context_with(Arc::new(FailingFetcher::not_found()), None);
        let job = finished_job(&ctx, dir.path(), Some(vec!["one.js".to_string()]));

        run(&ctx, &job.job_id, Procedure::AnalyzeBatches { batch_size: 5 })
            .await
            .unwrap();
        ctx.store
            .update(&job.job_id, &mut |job| {
                job.file_paths = Some(vec!["two.js".to_string()]);
                Ok(())
            })
            .unwrap();
        run(&ctx, &job.job_id, Procedure::AnalyzeBatches { batch_size: 5 })
            .await
            .unwrap();

        let job = ctx.store.get(&job.job_id).unwrap();
        let progress = ProgressResponse::from(job.clone());
        assert_eq!((progress.completed_files, progress.total_files), (1, 1));
        assert_eq!(progress.progress_percentage, Some(100.0));

        let results = job.analysis_results.unwrap();
        assert!(results.contains_key("one.js"));
        assert!(results.contains_key("two.js"));
        assert_eq!(job.completed_batches, 1);
    }

    #[tokio::test]
    async fn empty_file_list_completes_with_zero_batches() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(Arc::new(FailingFetcher::not_found()), None);
        let job = finished_job(&ctx, dir.path(), Some(Vec::new()));

        run(&ctx, &job.job_id, Procedure::AnalyzeBatches { batch_size: 20 })
            .await
            .unwrap();

        let job = ctx.store.get(&job.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!((job.total_batches, job.completed_batches), (0, 0));
    }

    #[tokio::test]
    async fn batch_run_without_file_list_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(Arc::new(FailingFetcher::not_found()), None);
        let job = finished_job(&ctx, dir.path(), None);

        let err = run(&ctx, &job.job_id, Procedure::AnalyzeBatches { batch_size: 20 })
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NoSelection));
        let job = ctx.store.get(&job.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "Analysis failed");
    }

    #[tokio::test]
    async fn path_analysis_nests_directories_and_flags_missing_paths() {
        let dir = snapshot(&[
            ("app/main.py", "from x import *\n"),
            ("app/view.html", "<p>TODO</p>"),
            ("app/config.toml", "a = 1"),
            ("app/lib.rs", "fn main() {}"),
            ("app/__pycache__/main.cpython.py", "cached"),
            ("tool.rs", "fn tool() {}"),
        ]);
        let ctx = context_with(Arc::new(FailingFetcher::not_found()), None);
        let selected = vec!["app".to_string(), "tool.rs".to_string(), "nope".to_string()];
        let job = finished_job(&ctx, dir.path(), Some(selected));

        run(&ctx, &job.job_id, Procedure::AnalyzePaths).await.unwrap();

        let job = ctx.store.get(&job.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.message, "Analysis completed");
        let results = job.analysis_results.unwrap();

        match &results["app"] {
            AnalysisResult::Directory { files } => {
                assert_eq!(
                    files.keys().collect::<Vec<_>>(),
                    ["app/main.py", "app/view.html"]
                );
                match &files["app/main.py"] {
                    AnalysisResult::File { critiques } => {
                        assert!(critiques[0].starts_with("Wildcard imports"))
                    }
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(results["tool.rs"], AnalysisResult::File { .. }));
        assert_eq!(results["nope"], AnalysisResult::path_not_found());
    }

    #[tokio::test]
    async fn path_analysis_rejects_escaping_paths() {
        let dir = snapshot(&[("a.py", "x = 1")]);
        let ctx = context_with(Arc::new(FailingFetcher::not_found()), None);
        let job = finished_job(&ctx, dir.path(), Some(vec!["../a.py".to_string()]));

        run(&ctx, &job.job_id, Procedure::AnalyzePaths).await.unwrap();

        let results = ctx.store.get(&job.job_id).unwrap().analysis_results.unwrap();
        assert_eq!(results["../a.py"], AnalysisResult::path_not_found());
    }
}
