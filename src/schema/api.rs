use super::{
    AnalysisResult, CritiqueStyle, DirectoryContents, DirectorySize, JobRecord, JobStatus,
    RoastParameters, RoastedFile, SuggestionMode,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_SAMPLE_SIZE: usize = 20;
pub const DEFAULT_ROAST_FILE_COUNT: usize = 2;

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

fn default_file_count() -> usize {
    DEFAULT_ROAST_FILE_COUNT
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRequest {
    pub repo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobIdRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryRequest {
    pub job_id: String,
    /// Empty means the snapshot root.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionRequest {
    pub job_id: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingRequest {
    pub job_id: String,
    pub path: String,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchProcessRequest {
    pub job_id: String,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoRoastRequest {
    pub job_id: String,
    #[serde(default)]
    pub style: CritiqueStyle,
    pub description: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub directories: Option<Vec<String>>,
    #[serde(default = "default_file_count")]
    pub file_count: usize,
    #[serde(default)]
    pub suggestions: SuggestionMode,
}

impl AutoRoastRequest {
    pub fn parameters(&self) -> RoastParameters {
        RoastParameters {
            style: self.style,
            extensions: self.extensions.clone(),
            directories: self.directories.clone(),
            file_count: self.file_count,
            description: self.description.clone(),
            suggestions: self.suggestions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisJob {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryResponse {
    pub repo_url: String,
    pub total_files: usize,
    pub file_stats: BTreeMap<String, usize>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub repo_url: String,
    pub structure: Option<DirectoryContents>,
    pub message: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectorySizeResponse {
    pub directories: Vec<DirectorySize>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionResponse {
    pub job_id: String,
    pub selected_paths: Vec<String>,
    pub total_files: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SamplingResponse {
    pub job_id: String,
    pub path: String,
    pub sampled_files: Vec<String>,
    pub sample_size: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchProcessResponse {
    pub job_id: String,
    pub total_batches: usize,
    pub total_files: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub analysis_results: Option<BTreeMap<String, AnalysisResult>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub total_files: usize,
    pub completed_files: usize,
    pub total_batches: usize,
    pub completed_batches: usize,
    pub progress_percentage: Option<f64>,
    pub error: Option<String>,
}

impl From<JobRecord> for ProgressResponse {
    fn from(job: JobRecord) -> Self {
        let progress_percentage = (job.total_batches > 0)
            .then(|| job.completed_batches as f64 / job.total_batches as f64 * 100.0);
        Self {
            total_files: job.file_paths.as_ref().map_or(0, Vec::len),
            completed_files: job.completed_files,
            job_id: job.job_id,
            status: job.status,
            message: job.message,
            total_batches: job.total_batches,
            completed_batches: job.completed_batches,
            progress_percentage,
            error: job.error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoRoastResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub roasted_files: Vec<RoastedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<RoastParameters>,
    pub error: Option<String>,
}
