use super::repository::{ANALYZE_STARTED, STRUCTURE_STARTED, repository_stats};
use super::runner::{JobContext, JobRunner, Procedure, blocking};
use super::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use crate::schema::*;
use crate::services::classifier::Extensions;
use crate::services::selector::sample;
use crate::services::{
    ExploreError, FetchError, count_matching, list_children, remove_snapshot, subdirectory_sizes,
    validate_repo_url,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::fmt::Display;
use std::sync::Arc;

pub const MAX_SAMPLE_SIZE: usize = 50;
pub const MAX_ROAST_FILE_COUNT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<JobRunner>,
}

impl AppState {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self { runner }
    }

    fn ctx(&self) -> &JobContext {
        self.runner.context()
    }
}

pub fn router(state: AppState) -> Router {
    let repositories = Router::new()
        .route("/analyze", post(analyze_once))
        .route("/analyze/async", post(start_analysis))
        .route("/analyze/status/{job_id}", get(analysis_status))
        .route("/structure", post(start_structure))
        .route("/structure/{job_id}", get(structure_status))
        .route("/explore", post(explore))
        .route("/directory-sizes", post(directory_sizes))
        .route("/select", post(select_paths))
        .route("/sample", post(sample_directory))
        .route("/analyze/paths", post(start_path_analysis))
        .route("/analyze/paths/{job_id}", get(path_analysis_results))
        .route("/analyze/batch", post(start_batch_analysis))
        .route("/analyze/progress/{job_id}", get(analysis_progress))
        .route("/auto-roast", post(start_auto_roast))
        .route("/auto-roast/{job_id}", get(auto_roast_results));

    Router::new()
        .route("/", get(welcome))
        .nest("/api/repositories", repositories)
        .with_state(state)
}

/// Error answered as `{"detail": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        let detail = err.to_string();
        match err {
            JobError::NotFound { .. } => Self::NotFound(detail),
            JobError::MissingSnapshot
            | JobError::NoSelection
            | JobError::NoPathSelection
            | JobError::Explore(ExploreError::NotFound { .. }) => Self::BadRequest(detail),
            JobError::InFlight { .. } => Self::Conflict(detail),
            JobError::Fetch(FetchError::InvalidUrl(_)) => Self::Validation(detail),
            _ => Self::Internal(detail),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        JobError::from(err).into()
    }
}

impl From<ExploreError> for ApiError {
    fn from(err: ExploreError) -> Self {
        JobError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn checked_range(name: &str, value: usize, min: usize, max: usize) -> Result<usize, ApiError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::Validation(format!(
            "{name} must be between {min} and {max}, got {value}"
        )))
    }
}

fn queued(job: &JobRecord) -> Json<AnalysisJob> {
    Json(AnalysisJob {
        job_id: job.job_id.clone(),
        status: job.status,
        message: job.message.clone(),
    })
}

async fn welcome() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Repo Critic API",
        "api": "/api/repositories",
    }))
}

fn analyze_failure(err: impl Display) -> ApiError {
    ApiError::Internal(format!("Failed to analyze repository: {err}"))
}

/// Fetch, count and discard in one request.
async fn analyze_once(
    State(state): State<AppState>,
    Json(request): Json<RepositoryRequest>,
) -> ApiResult<RepositoryResponse> {
    validate_repo_url(&request.repo_url)?;

    let repo_path = state
        .ctx()
        .fetcher
        .fetch(&request.repo_url)
        .await
        .map_err(analyze_failure)?;
    let stats = repository_stats(&repo_path).await;
    tokio::spawn(async move { remove_snapshot(&repo_path).await });

    let (total_files, file_stats) = stats.map_err(analyze_failure)?;
    Ok(Json(RepositoryResponse {
        repo_url: request.repo_url,
        total_files,
        file_stats,
        message: "Repository analyzed successfully".to_string(),
    }))
}

async fn start_fetching_job(
    state: &AppState,
    request: RepositoryRequest,
    message: &str,
    procedure: Procedure,
) -> ApiResult<AnalysisJob> {
    validate_repo_url(&request.repo_url)?;
    let job = state.ctx().store.insert(JobRecord::new(request.repo_url, message));
    state.runner.dispatch(&job.job_id, procedure);
    Ok(queued(&job))
}

async fn start_analysis(
    State(state): State<AppState>,
    Json(request): Json<RepositoryRequest>,
) -> ApiResult<AnalysisJob> {
    start_fetching_job(&state, request, ANALYZE_STARTED, Procedure::AnalyzeRepository).await
}

async fn analysis_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<RepositoryResponse> {
    let job = state.ctx().store.get(&job_id)?;
    if job.status != JobStatus::Completed {
        return Err(ApiError::BadRequest(format!(
            "Job not completed yet. Current status: {}",
            job.status
        )));
    }
    Ok(Json(RepositoryResponse {
        repo_url: job.repo_url,
        total_files: job.total_files.unwrap_or_default(),
        file_stats: job.file_stats.unwrap_or_default(),
        message: job.message,
    }))
}

async fn start_structure(
    State(state): State<AppState>,
    Json(request): Json<RepositoryRequest>,
) -> ApiResult<AnalysisJob> {
    start_fetching_job(&state, request, STRUCTURE_STARTED, Procedure::Structure).await
}

async fn structure_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<StructureResponse> {
    let job = state.ctx().store.get(&job_id)?;
    Ok(Json(StructureResponse {
        job_id: job.job_id,
        status: job.status,
        repo_url: job.repo_url,
        structure: job.structure,
        message: job.message,
        error: job.error,
    }))
}

async fn explore(
    State(state): State<AppState>,
    Json(request): Json<DirectoryRequest>,
) -> ApiResult<DirectoryContents> {
    let job = state.ctx().store.get(&request.job_id)?;
    let root = job.snapshot()?.to_path_buf();
    let contents = blocking(move || list_children(&root, &request.path)).await??;
    Ok(Json(contents))
}

async fn directory_sizes(
    State(state): State<AppState>,
    Json(request): Json<DirectoryRequest>,
) -> ApiResult<DirectorySizeResponse> {
    let job = state.ctx().store.get(&request.job_id)?;
    let root = job.snapshot()?.to_path_buf();
    let directories = blocking(move || subdirectory_sizes(&root, &request.path)).await?;
    Ok(Json(DirectorySizeResponse {
        total_count: directories.len(),
        directories,
    }))
}

async fn select_paths(
    State(state): State<AppState>,
    Json(request): Json<SelectionRequest>,
) -> ApiResult<SelectionResponse> {
    let ctx = state.ctx();
    let job = ctx.store.get(&request.job_id)?;
    let root = job.snapshot()?.to_path_buf();

    let paths = request.paths.clone();
    let (total_files, file_paths) =
        blocking(move || count_matching(&root, &paths, Some(&Extensions::code_default()))).await?;

    let respond = |message: String| {
        Json(SelectionResponse {
            job_id: request.job_id.clone(),
            selected_paths: request.paths.clone(),
            total_files,
            message,
        })
    };

    if total_files > ctx.config.selection_max {
        tracing::info!(job_id = %request.job_id, total_files, "selection over limit, not recorded");
        return Ok(respond(format!(
            "⚠️ Your selection contains {total_files} files, which exceeds the maximum limit of {}. Please select fewer files or specific subdirectories.",
            ctx.config.selection_max
        )));
    }

    let message = if total_files > ctx.config.selection_warn {
        format!(
            "⚠️ Warning: Your selection contains {total_files} files. Analysis may take some time. Consider selecting specific subdirectories instead."
        )
    } else {
        format!(
            "Selected {} paths containing {total_files} code files",
            request.paths.len()
        )
    };

    ctx.store.update(&request.job_id, &mut |job| {
        job.selected_paths = Some(request.paths.clone());
        job.file_paths = Some(file_paths.clone());
        job.touch();
        Ok(())
    })?;
    Ok(respond(message))
}

async fn sample_directory(
    State(state): State<AppState>,
    Json(request): Json<SamplingRequest>,
) -> ApiResult<SamplingResponse> {
    let sample_size = checked_range("sample_size", request.sample_size, 1, MAX_SAMPLE_SIZE)?;
    let ctx = state.ctx();
    let job = ctx.store.get(&request.job_id)?;
    let root = job.snapshot()?.to_path_buf();

    let directory = request.path.clone();
    let sampled_files = blocking(move || {
        sample(&root, &directory, sample_size, Some(&Extensions::code_default()))
    })
    .await?;

    ctx.store.update(&request.job_id, &mut |job| {
        job.selected_paths = Some(sampled_files.clone());
        job.file_paths = Some(sampled_files.clone());
        job.touch();
        Ok(())
    })?;

    Ok(Json(SamplingResponse {
        message: format!("Sampled {} files from {}", sampled_files.len(), request.path),
        job_id: request.job_id,
        path: request.path,
        sample_size: sampled_files.len(),
        sampled_files,
    }))
}

async fn start_path_analysis(
    State(state): State<AppState>,
    Json(request): Json<JobIdRequest>,
) -> ApiResult<AnalysisJob> {
    let job = state.ctx().store.update(&request.job_id, &mut |job| {
        job.snapshot()?;
        if job.selected_paths.is_none() {
            return Err(JobError::NoPathSelection);
        }
        job.begin_run("Analysis queued")
    })?;
    state.runner.dispatch(&job.job_id, Procedure::AnalyzePaths);
    Ok(queued(&job))
}

async fn start_batch_analysis(
    State(state): State<AppState>,
    Json(request): Json<BatchProcessRequest>,
) -> ApiResult<BatchProcessResponse> {
    let ctx = state.ctx();
    let batch_size = checked_range(
        "batch_size",
        request.batch_size.unwrap_or(ctx.config.default_batch_size),
        MIN_BATCH_SIZE,
        MAX_BATCH_SIZE,
    )?;

    let job = ctx.store.update(&request.job_id, &mut |job| {
        if job.file_paths.is_none() {
            return Err(JobError::NoSelection);
        }
        job.snapshot()?;
        job.begin_run("Analysis queued")
    })?;

    let total_files = job.file_paths.as_ref().map_or(0, Vec::len);
    let total_batches = total_files.div_ceil(batch_size);
    state
        .runner
        .dispatch(&job.job_id, Procedure::AnalyzeBatches { batch_size });

    Ok(Json(BatchProcessResponse {
        job_id: job.job_id,
        total_batches,
        total_files,
        message: format!("Started processing {total_files} files in {total_batches} batches"),
    }))
}

async fn path_analysis_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<AnalysisResponse> {
    let job = state.ctx().store.get(&job_id)?;
    Ok(Json(AnalysisResponse {
        job_id: job.job_id,
        status: job.status,
        message: job.message,
        analysis_results: job.analysis_results,
        error: job.error,
    }))
}

async fn analysis_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<ProgressResponse> {
    let job = state.ctx().store.get(&job_id)?;
    Ok(Json(ProgressResponse::from(job)))
}

async fn start_auto_roast(
    State(state): State<AppState>,
    Json(request): Json<AutoRoastRequest>,
) -> ApiResult<AnalysisJob> {
    checked_range("file_count", request.file_count, 1, MAX_ROAST_FILE_COUNT)?;
    let params = request.parameters();

    let job = state.ctx().store.update(&request.job_id, &mut |job| {
        job.snapshot()?;
        job.begin_run(format!("Auto-critique queued ({} style)", params.style))
    })?;
    state.runner.dispatch(&job.job_id, Procedure::AutoRoast(params));
    Ok(queued(&job))
}

async fn auto_roast_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<AutoRoastResponse> {
    let job = state.ctx().store.get(&job_id)?;
    if job.status.is_terminal() && job.roasted_files.is_none() {
        return Err(ApiError::BadRequest(
            "No roasted files found for this job".to_string(),
        ));
    }
    Ok(Json(AutoRoastResponse {
        job_id: job.job_id,
        status: job.status,
        message: job.message,
        roasted_files: job.roasted_files.unwrap_or_default(),
        summary: job.summary,
        parameters: job.parameters,
        error: job.error,
    }))
}
