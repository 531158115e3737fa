//! Fixture helpers and fakes shared by unit tests.

use crate::config::Config;
use crate::functions::JobContext;
use crate::schema::{CritiqueStyle, SuggestionMode};
use crate::services::{CritiqueEngine, FetchError, InMemoryJobStore, RepositoryFetcher};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use walkdir::WalkDir;

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Temporary snapshot directory populated with `(relative path, content)` pairs.
pub fn snapshot(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (relative, content) in files {
        write_file(dir.path(), relative, content);
    }
    dir
}

/// Source text with exactly `lines` newline-delimited segments and at least `min_bytes` bytes.
pub fn source_text(lines: usize, min_bytes: usize) -> String {
    let per_line = min_bytes.div_ceil(lines.max(1)).max(1);
    let line = "x".repeat(per_line);
    vec![line; lines].join("\n")
}

pub fn context_with(
    fetcher: Arc<dyn RepositoryFetcher>,
    critic: Option<Arc<dyn CritiqueEngine>>,
) -> Arc<JobContext> {
    let config = Config {
        snapshot_dir: std::env::temp_dir(),
        ..Config::default()
    };
    Arc::new(JobContext {
        store: Arc::new(InMemoryJobStore::new()),
        fetcher,
        critic,
        config,
    })
}

/// Hands out a fresh copy of a local tree on every fetch.
///
/// Copies live under a directory owned by the fetcher and vanish with it.
pub struct FixtureFetcher {
    source: PathBuf,
    snapshots: TempDir,
}

impl FixtureFetcher {
    pub fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            snapshots: tempfile::tempdir().unwrap(),
        }
    }
}

#[async_trait]
impl RepositoryFetcher for FixtureFetcher {
    async fn fetch(&self, _repo_url: &str) -> Result<PathBuf, FetchError> {
        let target = tempfile::Builder::new()
            .prefix("repo_critic_")
            .tempdir_in(self.snapshots.path())?
            .keep();
        for entry in WalkDir::new(&self.source).min_depth(1) {
            let entry = entry.map_err(|e| FetchError::Network(e.to_string()))?;
            let Ok(relative) = entry.path().strip_prefix(&self.source) else {
                continue;
            };
            let dest = target.join(relative);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest)?;
            } else {
                std::fs::copy(entry.path(), &dest)?;
            }
        }
        Ok(target)
    }
}

pub struct FailingFetcher {
    kind: Failure,
}

enum Failure {
    NotFound,
    Network(String),
}

impl FailingFetcher {
    pub fn not_found() -> Self {
        Self {
            kind: Failure::NotFound,
        }
    }

    pub fn network(message: &str) -> Self {
        Self {
            kind: Failure::Network(message.to_string()),
        }
    }
}

#[async_trait]
impl RepositoryFetcher for FailingFetcher {
    async fn fetch(&self, _repo_url: &str) -> Result<PathBuf, FetchError> {
        Err(match &self.kind {
            Failure::NotFound => FetchError::NotFound,
            Failure::Network(message) => FetchError::Network(message.clone()),
        })
    }
}

/// Deterministic critic that echoes its inputs.
#[derive(Default)]
pub struct FakeCritic {
    summaries: AtomicUsize,
}

impl FakeCritic {
    pub fn summary_calls(&self) -> usize {
        self.summaries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CritiqueEngine for FakeCritic {
    async fn critique(
        &self,
        _code: &str,
        file_path: &str,
        style: CritiqueStyle,
        focus: Option<&str>,
    ) -> String {
        match focus {
            Some(focus) => format!("{style} critique of {file_path} ({focus})"),
            None => format!("{style} critique of {file_path}"),
        }
    }

    async fn suggestions(&self, _code: &str, file_path: &str, mode: SuggestionMode) -> String {
        let mode = match mode {
            SuggestionMode::None => return String::new(),
            SuggestionMode::Basic => "basic",
            SuggestionMode::Detailed => "detailed",
        };
        format!("{mode} suggestions for {file_path}")
    }

    async fn summarize(&self, pairs: &[(String, String)]) -> String {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        format!("summary of {} files", pairs.len())
    }
}
