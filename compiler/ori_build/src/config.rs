//! Build configuration.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Directory names never descended into when scanning a source path.
const DEFAULT_IGNORED_DIRS: &[&str] = &["target", "node_modules", "__pycache__"];

/// Configuration for an [`Orchestrator`](crate::Orchestrator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildConfig {
    /// Source path entries. Every entry is a root of package directories.
    pub source_path: Vec<PathBuf>,
    /// Where compiled classes and copied resources go. Resources are only
    /// copied when this is set.
    pub output_dir: Option<PathBuf>,
    /// Static compile mode: a full rebuild wipes the output directory and
    /// copies the source path into it before compiling.
    pub static_compile: bool,
    /// File extensions (without the dot) of typed sources. Every other file
    /// under the source path is a resource.
    pub source_extensions: Vec<String>,
    /// Directory names skipped while scanning. Hidden entries are always skipped.
    pub ignored_dirs: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            source_path: Vec::new(),
            output_dir: None,
            static_compile: false,
            source_extensions: vec!["ori".to_string()],
            ignored_dirs: DEFAULT_IGNORED_DIRS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl BuildConfig {
    /// Config with a single source root and defaults for everything else.
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        BuildConfig {
            source_path: vec![source_root.into()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_path.push(root.into());
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_static_compile(mut self, enabled: bool) -> Self {
        self.static_compile = enabled;
        self
    }

    /// Replace the typed-source extensions.
    #[must_use]
    pub fn with_source_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext: String = ext.into();
                ext.trim_start_matches('.').to_string()
            })
            .collect();
        self
    }

    /// Whether `path` is a typed source (as opposed to a resource).
    pub fn is_typed_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.source_extensions.iter().any(|s| s == ext))
    }

    /// Whether a directory entry named `name` is skipped while scanning.
    pub fn is_ignored(&self, name: &str) -> bool {
        name.starts_with('.') || self.ignored_dirs.iter().any(|d| d == name)
    }
}

/// `path` made absolute against the working directory, with `.` and `..`
/// resolved lexically. Symlinks are not followed.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
