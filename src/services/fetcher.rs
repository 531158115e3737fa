use async_trait::async_trait;
use reqwest::Url;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const SNAPSHOT_PREFIX: &str = "repo_critic_";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid repository URL: {0}")]
    InvalidUrl(String),
    #[error("Failed to clone repository: repository not found")]
    NotFound,
    #[error("Failed to clone repository: authentication required")]
    Authentication,
    #[error("Failed to clone repository: {0}")]
    Network(String),
    #[error("Failed to clone repository: {0}")]
    Io(#[from] std::io::Error),
}

/// Materializes a remote repository as a local directory.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Returns a directory owned by the caller until passed to [`remove_snapshot`].
    async fn fetch(&self, repo_url: &str) -> Result<PathBuf, FetchError>;
}

/// Accepts absolute http(s) URLs with a host.
pub fn validate_repo_url(repo_url: &str) -> Result<Url, FetchError> {
    let url = Url::parse(repo_url.trim()).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(FetchError::InvalidUrl("missing host".to_string()));
    }
    Ok(url)
}

/// Shallow single-branch checkout via the `git` binary.
pub struct GitFetcher {
    snapshot_root: PathBuf,
    program: OsString,
}

impl GitFetcher {
    pub fn new(snapshot_root: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_root: snapshot_root.into(),
            program: OsString::from("git"),
        }
    }

    #[cfg(test)]
    fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn fetch(&self, repo_url: &str) -> Result<PathBuf, FetchError> {
        let url = validate_repo_url(repo_url)?;

        tokio::fs::create_dir_all(&self.snapshot_root).await?;
        // deleted on drop unless kept after a successful clone
        let snapshot = tempfile::Builder::new()
            .prefix(SNAPSHOT_PREFIX)
            .tempdir_in(&self.snapshot_root)?;

        tracing::info!(repo_url = %url, path = %snapshot.path().display(), "cloning repository");
        let output = Command::new(&self.program)
            .args(git_clone_args(url.as_str(), snapshot.path()))
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(repo_url = %url, stderr = %stderr.trim(), "git clone failed");
            return Err(classify_clone_failure(&stderr));
        }

        Ok(snapshot.keep())
    }
}

fn git_clone_args(repo_url: &str, target: &Path) -> Vec<String> {
    vec![
        "clone".to_string(),
        "--single-branch".to_string(),
        "--depth".to_string(),
        "1".to_string(),
        "--quiet".to_string(),
        repo_url.to_string(),
        target.to_string_lossy().into_owned(),
    ]
}

fn classify_clone_failure(stderr: &str) -> FetchError {
    let lower = stderr.to_lowercase();
    if lower.contains("repository not found")
        || lower.contains("does not exist")
        || lower.contains("returned error: 404")
    {
        FetchError::NotFound
    } else if lower.contains("authentication failed")
        || lower.contains("could not read username")
        || lower.contains("terminal prompts disabled")
        || lower.contains("returned error: 403")
    {
        FetchError::Authentication
    } else {
        let detail = stderr.trim();
        FetchError::Network(if detail.is_empty() {
            "git exited unsuccessfully".to_string()
        } else {
            detail.to_string()
        })
    }
}

/// Best-effort removal; failures are logged and swallowed.
pub async fn remove_snapshot(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::info!(path = %path.display(), "removed repository snapshot"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove repository snapshot")
        }
    }
}
