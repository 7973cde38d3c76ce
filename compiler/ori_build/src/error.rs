//! Errors that abort a whole build.
//!
//! A unit failing to compile is not an error here: it is a
//! [`CompileResult`](crate::CompileResult) carrying diagnostics.

use std::io;
use std::path::PathBuf;

use ori_diagnostic::{Diagnostic, ErrorCode};

/// A build that could not run to completion.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Another build is still resolving, compiling or finalizing on the same
    /// orchestrator.
    #[error("a build is already running on this orchestrator")]
    AlreadyRunning,

    /// The output directory could not be emptied for a full rebuild.
    #[error("cannot clean output directory `{}`: {source}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A source or resource could not be copied into the output directory.
    #[error("cannot copy `{}` to `{}`: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The build worker could not be started.
    #[error("cannot start build worker: {0}")]
    Spawn(#[source] io::Error),

    /// The build pipeline itself died (e.g. a consumer panicked).
    #[error("build process aborted: {0}")]
    Aborted(String),
}

impl BuildError {
    /// The error code for errors that correspond to one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            BuildError::Clean { .. } => Some(ErrorCode::E7001),
            BuildError::Copy { .. } => Some(ErrorCode::E7002),
            BuildError::AlreadyRunning | BuildError::Spawn(_) | BuildError::Aborted(_) => None,
        }
    }

    /// Whether the error happened while touching the file system.
    pub fn is_io(&self) -> bool {
        matches!(self, BuildError::Clean { .. } | BuildError::Copy { .. })
    }

    /// Render as a diagnostic for the build report.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = match self.code() {
            Some(code) => Diagnostic::error(code),
            None => Diagnostic::error("build"),
        };
        let diagnostic = diagnostic.with_message(self.to_string());
        match self {
            BuildError::Clean { path, .. } => diagnostic.in_unit(path.display().to_string()),
            BuildError::Copy { from, .. } => diagnostic.in_unit(from.display().to_string()),
            _ => diagnostic,
        }
    }
}
