//! Source tree discovery.
//!
//! Walks every source path entry and classifies each file as a typed unit or
//! a resource. Directories below a root are packages: `src/app/model/User.ori`
//! under root `src` defines the type `app.model.User`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::unit::{CompilationUnit, ResourceFile, TypeName, TypeUnit};
use crate::config::normalize_path;
use crate::BuildConfig;

/// Snapshot of the units found under the configured source path.
#[derive(Clone, Debug, Default)]
pub struct SourceTree {
    config: BuildConfig,
    types: BTreeMap<TypeName, TypeUnit>,
    resources: Vec<ResourceFile>,
    /// Every discovered file, per root, sorted.
    files: BTreeMap<PathBuf, Vec<PathBuf>>,
}

impl SourceTree {
    /// Scan the source path described by `config`.
    ///
    /// Missing roots yield no files. When two roots define the same type the
    /// first root on the source path wins. An output directory below a root
    /// is not part of the tree.
    pub fn scan(config: &BuildConfig) -> Self {
        let mut tree = SourceTree {
            config: config.clone(),
            ..SourceTree::default()
        };
        let output = config.output_dir.as_deref().map(normalize_path);

        for root in &config.source_path {
            // The output directory as reached by walking this root.
            let excluded = output.as_ref().and_then(|output| {
                output
                    .strip_prefix(normalize_path(root))
                    .ok()
                    .filter(|relative| relative.components().next().is_some())
                    .map(|relative| root.join(relative))
            });
            let mut files = Vec::new();
            discover_recursive(root, config, excluded.as_deref(), &mut files);
            files.sort();

            for path in &files {
                match tree.classify(root, path) {
                    Some(CompilationUnit::Type(unit)) => {
                        if let Some(existing) = tree.types.get(&unit.name) {
                            tracing::debug!(
                                name = %unit.name,
                                kept = %existing.path.display(),
                                shadowed = %unit.path.display(),
                                "type defined on more than one source root"
                            );
                        } else {
                            tree.types.insert(unit.name.clone(), unit);
                        }
                    }
                    Some(CompilationUnit::Resource(resource)) => tree.resources.push(resource),
                    None => {}
                }
            }

            tree.files.insert(root.clone(), files);
        }

        tracing::debug!(
            types = tree.types.len(),
            resources = tree.resources.len(),
            "scanned source tree"
        );
        tree
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.config.source_path
    }

    /// All typed units, ordered by name.
    pub fn types(&self) -> impl Iterator<Item = &TypeUnit> {
        self.types.values()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn resources(&self) -> &[ResourceFile] {
        &self.resources
    }

    /// Files found under `root` during the scan.
    pub fn files_under(&self, root: &Path) -> &[PathBuf] {
        self.files.get(root).map_or(&[], Vec::as_slice)
    }

    pub fn get(&self, name: &TypeName) -> Option<&TypeUnit> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &TypeName) -> bool {
        self.types.contains_key(name)
    }

    /// Classify a path under `root`, whether or not it still exists.
    ///
    /// Returns `None` when `path` is not below `root`.
    pub fn classify(&self, root: &Path, path: &Path) -> Option<CompilationUnit> {
        let relative = path.strip_prefix(root).ok()?;
        let package = package_of(relative);

        if self.config.is_typed_source(path) {
            let stem = path.file_stem()?.to_str()?;
            let name = match &package {
                Some(package) => TypeName::new(format!("{package}.{stem}")),
                None => TypeName::new(stem),
            };
            Some(CompilationUnit::Type(TypeUnit {
                name,
                path: path.to_path_buf(),
            }))
        } else {
            Some(CompilationUnit::Resource(ResourceFile {
                path: path.to_path_buf(),
                package,
            }))
        }
    }
}

/// Dotted package of a root-relative path (its parent directories).
fn package_of(relative: &Path) -> Option<String> {
    let parent = relative.parent()?;
    let segments: Vec<&str> = parent
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("."))
    }
}

fn discover_recursive(
    dir: &Path,
    config: &BuildConfig,
    excluded: Option<&Path>,
    files: &mut Vec<PathBuf>,
) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                continue;
            }
        }

        if path.is_dir() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if config.is_ignored(name) {
                    continue;
                }
            }
            if excluded.is_some_and(|excluded| path == excluded) {
                tracing::trace!(path = %path.display(), "skipping output directory");
                continue;
            }
            discover_recursive(&path, config, excluded, files);
        } else {
            files.push(path);
        }
    }
}
