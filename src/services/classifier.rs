use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Directory names no traversal ever descends into.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "venv",
    "__pycache__",
    ".idea",
    ".vscode",
    "build",
    "dist",
];

pub const DEFAULT_CODE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".jsx", ".ts", ".tsx", ".java", ".c", ".cpp", ".cs", ".go", ".rb", ".php",
    ".swift", ".kt", ".rs",
];

/// Source and markup, without config or docs. Used when path analysis recurses into a directory.
pub const PATH_ANALYSIS_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".jsx", ".ts", ".tsx", ".java", ".c", ".cpp", ".cs", ".go", ".rb", ".php",
    ".html", ".css",
];

pub const OTHER_BUCKET: &str = "other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Language,
    Web,
    Config,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub kind: CategoryKind,
    pub label: &'static str,
    /// False when the extension is not in the table and fell through to "other".
    pub known: bool,
}

const CATEGORY_TABLE: &[(&str, CategoryKind, &str)] = &[
    (".py", CategoryKind::Language, "Python"),
    (".js", CategoryKind::Language, "JavaScript"),
    (".jsx", CategoryKind::Language, "React"),
    (".ts", CategoryKind::Language, "TypeScript"),
    (".tsx", CategoryKind::Language, "React TypeScript"),
    (".java", CategoryKind::Language, "Java"),
    (".c", CategoryKind::Language, "C"),
    (".cpp", CategoryKind::Language, "C++"),
    (".cs", CategoryKind::Language, "C#"),
    (".go", CategoryKind::Language, "Go"),
    (".rb", CategoryKind::Language, "Ruby"),
    (".php", CategoryKind::Language, "PHP"),
    (".swift", CategoryKind::Language, "Swift"),
    (".kt", CategoryKind::Language, "Kotlin"),
    (".rs", CategoryKind::Language, "Rust"),
    (".html", CategoryKind::Web, "HTML"),
    (".css", CategoryKind::Web, "CSS"),
    (".scss", CategoryKind::Web, "SCSS"),
    (".json", CategoryKind::Web, "JSON"),
    (".yml", CategoryKind::Config, "YAML"),
    (".yaml", CategoryKind::Config, "YAML"),
    (".xml", CategoryKind::Config, "XML"),
    (".toml", CategoryKind::Config, "TOML"),
    (".ini", CategoryKind::Config, "INI"),
    (".md", CategoryKind::Other, "Markdown"),
    (".sh", CategoryKind::Other, "Shell"),
    (".sql", CategoryKind::Other, "SQL"),
];

/// Lowercased extension with its leading dot, or an empty string when there is none.
///
/// Dotfiles such as `.gitignore` have no extension, matching how most tools treat them.
pub fn extension_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn classify(path: impl AsRef<Path>) -> Category {
    let ext = extension_of(path);
    CATEGORY_TABLE
        .iter()
        .find(|(candidate, _, _)| *candidate == ext)
        .map(|&(_, kind, label)| Category {
            kind,
            label,
            known: true,
        })
        .unwrap_or(Category {
            kind: CategoryKind::Other,
            label: "Other",
            known: false,
        })
}

/// Key under which a file is counted in per-extension stats.
pub fn stats_bucket(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    if classify(path).known {
        extension_of(path)
    } else {
        OTHER_BUCKET.to_string()
    }
}

pub fn is_ignored_dir(name: &str) -> bool {
    IGNORED_DIRS.contains(&name)
}

/// Normalized allow-list of file extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extensions(Vec<String>);

impl Extensions {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| ext.len() > 1)
            .collect();
        normalized.dedup();
        Self(normalized)
    }

    pub fn code_default() -> Self {
        Self::new(DEFAULT_CODE_EXTENSIONS)
    }

    pub fn path_analysis_default() -> Self {
        Self::new(PATH_ANALYSIS_EXTENSIONS)
    }

    /// Caller-supplied list, or the default code list when absent or empty.
    pub fn or_code_default(extensions: Option<&[String]>) -> Self {
        match extensions {
            Some(list) if !list.is_empty() => Self::new(list),
            _ => Self::code_default(),
        }
    }

    pub fn matches(&self, path: impl AsRef<Path>) -> bool {
        let ext = extension_of(path);
        !ext.is_empty() && self.0.iter().any(|allowed| *allowed == ext)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// True iff the extension is in `allowed`, or in the default code list when no list is given.
pub fn is_code(path: impl AsRef<Path>, allowed: Option<&Extensions>) -> bool {
    match allowed {
        Some(list) => list.matches(path),
        None => Extensions::code_default().matches(path),
    }
}

/// Joins a caller-supplied relative path onto `root`, refusing anything that escapes it.
///
/// Symbolic links are never followed: a path through a link resolves to `None`.
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                if is_symlink(&resolved) {
                    return None;
                }
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|meta| meta.file_type().is_symlink())
}

/// Slash-separated path of `path` relative to `root`.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
