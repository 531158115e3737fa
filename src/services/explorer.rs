use crate::schema::{DirectoryContents, DirectoryEntry, DirectorySize, FileEntry};
use crate::services::classifier::{
    Extensions, extension_of, is_ignored_dir, relative_to, resolve_within, stats_bucket,
};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum ExploreError {
    #[error("Directory not found")]
    NotFound { path: String },
    #[error("Failed to read directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves a caller-supplied path inside a snapshot.
///
/// Returns `None` for paths that escape the snapshot or pass through an ignored
/// directory, so callers treat them exactly like missing paths.
pub fn resolve_snapshot_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let through_ignored = Path::new(relative).components().any(|c| match c {
        Component::Normal(part) => is_ignored_dir(&part.to_string_lossy()),
        _ => false,
    });
    if through_ignored {
        return None;
    }
    resolve_within(root, relative)
}

/// Every regular file beneath `dir` in file-name order, never descending into ignored directories.
pub fn walk_files(dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && is_ignored_dir(&entry.file_name().to_string_lossy()))
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
}

fn count_files(dir: &Path) -> usize {
    walk_files(dir).count()
}

fn join_relative(parent: &str, name: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() || parent == "." {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Children of `dir` sorted by name.
fn sorted_children(dir: &Path) -> std::io::Result<Vec<std::fs::DirEntry>> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

/// Directory entry that is a directory itself, not a link to one.
fn is_real_dir(entry: &std::fs::DirEntry) -> bool {
    entry.file_type().is_ok_and(|file_type| file_type.is_dir())
}

/// Lists the immediate children of a snapshot directory. Symbolic links are left out.
pub fn list_children(root: &Path, relative: &str) -> Result<DirectoryContents, ExploreError> {
    let dir = resolve_snapshot_path(root, relative)
        .filter(|path| path.is_dir())
        .ok_or_else(|| ExploreError::NotFound {
            path: relative.to_string(),
        })?;

    let mut directories = Vec::new();
    let mut files = Vec::new();

    for entry in sorted_children(&dir)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let full_path = entry.path();
        let path = join_relative(relative, &name);
        let file_type = match entry.file_type() {
            Ok(file_type) if !file_type.is_symlink() => file_type,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "failed to stat entry");
                continue;
            }
        };

        if file_type.is_dir() {
            if is_ignored_dir(&name) {
                continue;
            }
            directories.push(DirectoryEntry {
                file_count: count_files(&full_path),
                name,
                path,
            });
        } else {
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to stat file");
                    0
                }
            };
            files.push(FileEntry {
                extension: extension_of(&name),
                name,
                path,
                size,
            });
        }
    }

    Ok(DirectoryContents {
        current_path: relative.to_string(),
        directories,
        files,
    })
}

pub fn subdirectory_sizes(root: &Path, relative: &str) -> Vec<DirectorySize> {
    let Some(dir) = resolve_snapshot_path(root, relative).filter(|path| path.is_dir()) else {
        return Vec::new();
    };
    let children = match sorted_children(&dir) {
        Ok(children) => children,
        Err(e) => {
            tracing::warn!(path = %relative, error = %e, "failed to list directory");
            return Vec::new();
        }
    };
    let code = Extensions::code_default();

    children
        .into_iter()
        .filter(is_real_dir)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_ignored_dir(&name) {
                return None;
            }
            let full_path = entry.path();

            let mut total_files = 0;
            let mut code_files = 0;
            for file in walk_files(&full_path) {
                total_files += 1;
                if code.matches(file.path()) {
                    code_files += 1;
                }
            }

            let subdirectories = sorted_children(&full_path)
                .map(|grandchildren| {
                    grandchildren
                        .iter()
                        .filter(|child| {
                            is_real_dir(child)
                                && !is_ignored_dir(&child.file_name().to_string_lossy())
                        })
                        .count()
                })
                .unwrap_or(0);

            Some(DirectorySize {
                path: join_relative(relative, &name),
                name,
                total_files,
                code_files,
                subdirectories,
            })
        })
        .collect()
}

/// Files under `dir` (relative to `root`) whose extension passes `filter`.
pub fn matching_files(root: &Path, dir: &Path, filter: Option<&Extensions>) -> Vec<String> {
    walk_files(dir)
        .filter(|entry| filter.is_none_or(|f| f.matches(entry.path())))
        .map(|entry| relative_to(root, entry.path()))
        .collect()
}

/// Expands each selected path into concrete file paths.
///
/// Overlapping inputs are not de-duplicated: a file reachable from two inputs is listed twice.
pub fn count_matching(
    root: &Path,
    paths: &[String],
    filter: Option<&Extensions>,
) -> (usize, Vec<String>) {
    let mut file_paths = Vec::new();

    for path in paths {
        let Some(full_path) = resolve_snapshot_path(root, path) else {
            continue;
        };
        if full_path.is_file() {
            if filter.is_none_or(|f| f.matches(&full_path)) {
                file_paths.push(path.clone());
            }
        } else if full_path.is_dir() {
            file_paths.extend(matching_files(root, &full_path, filter));
        }
    }

    (file_paths.len(), file_paths)
}

/// Buckets every file by extension, unknown extensions under "other".
pub fn traverse(root: &Path) -> BTreeMap<String, Vec<String>> {
    let mut buckets: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in walk_files(root) {
        buckets
            .entry(stats_bucket(entry.path()))
            .or_default()
            .push(relative_to(root, entry.path()));
    }
    buckets
}
