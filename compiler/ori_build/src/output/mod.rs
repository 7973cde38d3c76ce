//! The build output directory.
//!
//! Artifacts mirror the package structure: package `app.model` lives in
//! `<out>/app/model/`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::normalize_path;
use crate::unit::ResourceFile;
use crate::{BuildError, SourceTree};

#[derive(Clone, Debug)]
pub struct OutputDir {
    path: PathBuf,
}

impl OutputDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        OutputDir { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove everything inside the directory, creating it if missing.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub fn clean(&self) -> Result<(), BuildError> {
        let clean_err = |source| BuildError::Clean {
            path: self.path.clone(),
            source,
        };

        match fs::read_dir(&self.path) {
            Ok(entries) => {
                for entry in entries {
                    let path = entry.map_err(clean_err)?.path();
                    let removed = if path.is_dir() {
                        fs::remove_dir_all(&path)
                    } else {
                        fs::remove_file(&path)
                    };
                    removed.map_err(clean_err)?;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(clean_err(err)),
        }
        fs::create_dir_all(&self.path).map_err(clean_err)
    }

    /// Copy every file of every source root into the directory, keeping
    /// paths relative to their root. Returns the number of files copied.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub fn copy_source_path(&self, tree: &SourceTree) -> Result<usize, BuildError> {
        let output = normalize_path(&self.path);
        let mut copied = 0;
        for root in tree.roots() {
            for file in tree.files_under(root) {
                if normalize_path(file).starts_with(&output) {
                    continue;
                }
                let Ok(relative) = file.strip_prefix(root) else {
                    continue;
                };
                copy_file(file, &self.path.join(relative))?;
                copied += 1;
            }
        }
        tracing::debug!(copied, "copied source path");
        Ok(copied)
    }

    /// Copy one resource under its package directory.
    pub fn copy_resource(&self, resource: &ResourceFile) -> Result<PathBuf, BuildError> {
        let to = self.path.join(resource.output_relative_path());
        copy_file(&resource.path, &to)?;
        tracing::trace!(from = %resource.path.display(), to = %to.display(), "copied resource");
        Ok(to)
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    let copy_err = |source| BuildError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(copy_err)?;
    }
    fs::copy(from, to).map_err(copy_err)?;
    Ok(())
}
