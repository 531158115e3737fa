use crate::services::classifier::{Extensions, relative_to};
use crate::services::explorer::{matching_files, resolve_snapshot_path, walk_files};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::path::Path;

/// Fewer primary-pass candidates than this triggers the relaxed pass.
pub const MIN_PRIMARY_CANDIDATES: usize = 5;
/// Pool size as a multiple of the requested count.
pub const POOL_FACTOR: usize = 3;

const IDEAL_LINES: f64 = 200.0;
const IDEAL_BYTES: f64 = 5000.0;

/// A file considered for critique, content already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: String,
    pub content: String,
    pub line_count: usize,
    pub byte_size: u64,
}

impl CandidateFile {
    pub fn score(&self) -> f64 {
        complexity_score(self.line_count, self.byte_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionBounds {
    pub min_bytes: Option<u64>,
    pub max_bytes: Option<u64>,
    pub min_lines: Option<usize>,
    pub max_lines: Option<usize>,
}

impl SelectionBounds {
    pub const PRIMARY: Self = Self {
        min_bytes: Some(500),
        max_bytes: Some(15_000),
        min_lines: Some(50),
        max_lines: Some(500),
    };

    pub const FALLBACK: Self = Self {
        min_bytes: None,
        max_bytes: None,
        min_lines: None,
        max_lines: Some(1000),
    };

    fn admits_size(&self, bytes: u64) -> bool {
        self.min_bytes.is_none_or(|min| bytes >= min) && self.max_bytes.is_none_or(|max| bytes <= max)
    }

    fn admits_lines(&self, lines: usize) -> bool {
        self.min_lines.is_none_or(|min| lines >= min) && self.max_lines.is_none_or(|max| lines <= max)
    }
}

/// Lower is more interesting: substantial but not sprawling.
pub fn complexity_score(line_count: usize, byte_size: u64) -> f64 {
    (line_count as f64 - IDEAL_LINES).abs() + (byte_size as f64 - IDEAL_BYTES).abs() / 100.0
}

/// Newline-delimited segments, so an empty file has one line.
pub fn line_count(content: &str) -> usize {
    content.split('\n').count()
}

/// Strips `./` prefixes and surrounding slashes so `./src/` and `src` name the same directory.
fn normalize_dir(dir: &str) -> &str {
    let mut dir = dir.trim_matches('/');
    while let Some(rest) = dir.strip_prefix("./") {
        dir = rest.trim_start_matches('/');
    }
    dir
}

fn in_directories(relative_dir: &str, directories: &[String]) -> bool {
    directories.iter().any(|dir| {
        let dir = normalize_dir(dir);
        dir.is_empty()
            || dir == "."
            || relative_dir == dir
            || relative_dir
                .strip_prefix(dir)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

fn collect_candidates(
    root: &Path,
    filter: &Extensions,
    directories: Option<&[String]>,
    bounds: SelectionBounds,
) -> Vec<CandidateFile> {
    let mut candidates = Vec::new();

    for entry in walk_files(root) {
        let path = entry.path();
        if !filter.matches(path) {
            continue;
        }
        let relative = relative_to(root, path);
        if let Some(dirs) = directories.filter(|dirs| !dirs.is_empty()) {
            let parent = relative.rsplit_once('/').map_or("", |(dir, _)| dir);
            if !in_directories(parent, dirs) {
                continue;
            }
        }

        let byte_size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!(path = %relative, error = %e, "failed to stat candidate file");
                continue;
            }
        };
        if !bounds.admits_size(byte_size) {
            continue;
        }

        let content = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!(path = %relative, error = %e, "failed to read candidate file");
                continue;
            }
        };
        let lines = line_count(&content);
        if !bounds.admits_lines(lines) {
            continue;
        }

        candidates.push(CandidateFile {
            path: relative,
            content,
            line_count: lines,
            byte_size,
        });
    }

    candidates
}

/// Up to `sample_size` distinct matching files under `directory`, chosen uniformly.
pub fn sample(
    root: &Path,
    directory: &str,
    sample_size: usize,
    filter: Option<&Extensions>,
) -> Vec<String> {
    sample_with_rng(root, directory, sample_size, filter, &mut rand::rng())
}

pub fn sample_with_rng<R: Rng + ?Sized>(
    root: &Path,
    directory: &str,
    sample_size: usize,
    filter: Option<&Extensions>,
    rng: &mut R,
) -> Vec<String> {
    let Some(dir) = resolve_snapshot_path(root, directory).filter(|path| path.is_dir()) else {
        return Vec::new();
    };
    let files = matching_files(root, &dir, filter);
    if files.len() <= sample_size {
        return files;
    }
    files.choose_multiple(rng, sample_size).cloned().collect()
}

/// Picks files worth critiquing.
///
/// Scores every candidate that survives the size/line bounds, keeps the best
/// `desired_count * POOL_FACTOR`, then draws `desired_count` of those at random so
/// repeated runs don't always land on the same files.
pub fn select_for_critique(
    root: &Path,
    filter: &Extensions,
    directories: Option<&[String]>,
    desired_count: usize,
) -> Vec<CandidateFile> {
    select_for_critique_with_rng(root, filter, directories, desired_count, &mut rand::rng())
}

pub fn select_for_critique_with_rng<R: Rng + ?Sized>(
    root: &Path,
    filter: &Extensions,
    directories: Option<&[String]>,
    desired_count: usize,
    rng: &mut R,
) -> Vec<CandidateFile> {
    let mut candidates = collect_candidates(root, filter, directories, SelectionBounds::PRIMARY);
    if candidates.len() < MIN_PRIMARY_CANDIDATES {
        tracing::info!(
            primary = candidates.len(),
            "too few files within primary bounds, relaxing constraints"
        );
        candidates = collect_candidates(root, filter, directories, SelectionBounds::FALLBACK);
    }

    candidates.sort_by(|a, b| a.score().total_cmp(&b.score()));
    let pool_size = desired_count.saturating_mul(POOL_FACTOR).min(candidates.len());
    candidates.truncate(pool_size);

    let pick = desired_count.min(candidates.len());
    let chosen = rand::seq::index::sample(rng, candidates.len(), pick);
    let mut slots: Vec<Option<CandidateFile>> = candidates.into_iter().map(Some).collect();
    let selected: Vec<CandidateFile> = chosen
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect();

    tracing::debug!(pool = pool_size, selected = selected.len(), "selected files for critique");
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{snapshot, source_text};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn scores_favor_medium_files() {
        assert_eq!(complexity_score(200, 5000), 0.0);
        assert_eq!(complexity_score(250, 4000), 60.0);
        assert!(complexity_score(210, 5100) < complexity_score(60, 600));
    }

    #[test]
    fn counts_newline_segments() {
        assert_eq!(line_count(""), 1);
        assert_eq!(line_count("a\nb"), 2);
        assert_eq!(line_count("a\nb\n"), 3);
    }

    #[test]
    fn sample_returns_distinct_matching_paths_under_directory() {
        let files: Vec<(String, &str)> = (0..12)
            .map(|i| (format!("pkg/mod_{i}.rs"), "x"))
            .chain((0..4).map(|i| (format!("pkg/doc_{i}.md"), "y")))
            .chain(std::iter::once(("other/outside.rs".to_string(), "z")))
            .collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), *c)).collect();
        let dir = snapshot(&refs);
        let code = Extensions::code_default();
        let mut rng = StdRng::seed_from_u64(7);

        let picked = sample_with_rng(dir.path(), "pkg", 5, Some(&code), &mut rng);
        assert_eq!(picked.len(), 5);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(picked.iter().all(|p| p.starts_with("pkg/") && p.ends_with(".rs")));

        let all = sample(dir.path(), "pkg", 50, Some(&code));
        assert_eq!(all.len(), 12);
    }

    #[test]
    fn sample_of_missing_directory_is_empty() {
        let dir = snapshot(&[("a.rs", "x")]);
        assert!(sample(dir.path(), "missing", 3, None).is_empty());
        assert!(sample(dir.path(), "a.rs", 3, None).is_empty());
    }

    #[test]
    fn primary_pass_respects_bounds() {
        let good = source_text(200, 5000);
        let tiny = "fn main() {}\n".to_string();
        let huge = source_text(800, 20_000);
        let mut files = vec![("tiny.rs".to_string(), tiny), ("huge.rs".to_string(), huge)];
        for i in 0..6 {
            files.push((format!("src/good_{i}.rs"), good.clone()));
        }
        let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let dir = snapshot(&refs);

        let picked = select_for_critique(dir.path(), &Extensions::code_default(), None, 10);
        assert_eq!(picked.len(), 6);
        for file in &picked {
            assert!((500..=15_000).contains(&file.byte_size));
            assert!((50..=500).contains(&file.line_count));
            assert!(file.path.starts_with("src/good_"));
        }
    }

    #[test]
    fn falls_back_when_primary_pass_is_too_small() {
        let good = source_text(200, 5000);
        let files = vec![
            ("a.rs", good.as_str()),
            ("b.rs", good.as_str()),
            ("small.rs", "fn x() {}"),
            ("script.py", "print('hi')\n"),
        ];
        let long = source_text(1200, 1200);
        let mut refs = files.clone();
        refs.push(("too_long.rs", long.as_str()));
        let dir = snapshot(&refs);

        let picked = select_for_critique(dir.path(), &Extensions::code_default(), None, 10);
        let paths: HashSet<_> = picked.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, HashSet::from(["a.rs", "b.rs", "small.rs", "script.py"]));
        assert!(picked.iter().all(|f| f.line_count <= 1000));
    }

    #[test]
    fn picks_from_best_scored_pool() {
        let mut files = Vec::new();
        for (i, lines) in [200, 210, 220, 400, 450, 480, 495].iter().enumerate() {
            files.push((format!("f{i}.rs"), source_text(*lines, 5000)));
        }
        let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let dir = snapshot(&refs);
        let filter = Extensions::code_default();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = select_for_critique_with_rng(dir.path(), &filter, None, 1, &mut rng);
            assert_eq!(picked.len(), 1);
            assert!(["f0.rs", "f1.rs", "f2.rs"].contains(&picked[0].path.as_str()));
            assert!(!picked[0].content.is_empty());
        }
    }

    #[test]
    fn never_exceeds_desired_count() {
        let good = source_text(200, 5000);
        let files: Vec<(String, String)> =
            (0..8).map(|i| (format!("m{i}.go"), good.clone())).collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let dir = snapshot(&refs);

        let picked = select_for_critique(dir.path(), &Extensions::code_default(), None, 2);
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0].path, picked[1].path);
        assert!(select_for_critique(dir.path(), &Extensions::code_default(), None, 0).is_empty());
    }

    #[test]
    fn restricts_to_listed_directories() {
        let good = source_text(200, 5000);
        let refs = vec![
            ("src/a.rs", good.as_str()),
            ("src/nested/b.rs", good.as_str()),
            ("srcgen/c.rs", good.as_str()),
            ("tests/d.rs", good.as_str()),
            ("e.rs", good.as_str()),
        ];
        let dir = snapshot(&refs);
        let dirs = vec!["src".to_string()];

        let picked =
            select_for_critique(dir.path(), &Extensions::code_default(), Some(&dirs), 10);
        let paths: HashSet<_> = picked.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, HashSet::from(["src/a.rs", "src/nested/b.rs"]));
    }

    #[test]
    fn directory_filter_accepts_dot_prefixed_paths() {
        assert_eq!(normalize_dir("./src/"), "src");
        assert_eq!(normalize_dir(".//src/nested"), "src/nested");
        assert_eq!(normalize_dir("./"), ".");
        assert_eq!(normalize_dir("./.git"), ".git");

        let good = source_text(200, 5000);
        let refs = vec![
            ("src/a.rs", good.as_str()),
            ("src/nested/b.rs", good.as_str()),
            ("tests/d.rs", good.as_str()),
        ];
        let dir = snapshot(&refs);
        let dirs = vec!["./src/nested/".to_string()];

        let picked =
            select_for_critique(dir.path(), &Extensions::code_default(), Some(&dirs), 10);
        let paths: Vec<_> = picked.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["src/nested/b.rs"]);
    }

    #[test]
    fn honors_custom_extension_filter() {
        let good = source_text(200, 5000);
        let refs = vec![("a.rs", good.as_str()), ("b.py", good.as_str())];
        let dir = snapshot(&refs);
        let picked = select_for_critique(dir.path(), &Extensions::new(["py"]), None, 5);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].path, "b.py");
    }
}
