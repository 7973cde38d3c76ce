//! Core diagnostic types for structured build reporting.
//!
//! Defines [`Diagnostic`], [`DiagnosticCode`], [`Location`] and [`Severity`],
//! the records a compile engine hands back for each unit and that the build
//! report aggregates.

use std::borrow::Cow;
use std::fmt;

use crate::ErrorCode;

/// Severity level for diagnostics.
///
/// Ordered from least to most severe so `max()` picks the worst one.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Severity {
    Help,
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
            Severity::Help => write!(f, "help"),
        }
    }
}

/// Stable identifier of a diagnostic message.
///
/// Either one of the build tooling's own [`ErrorCode`]s, or whatever code an
/// external compile engine attaches (e.g. `E2001`, `deprecation`). Counting
/// and grouping only ever look at the code and severity, never the text.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct DiagnosticCode(Cow<'static, str>);

impl DiagnosticCode {
    /// Create a code from any string.
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        DiagnosticCode(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The build tooling's own code, if this is one.
    pub fn known(&self) -> Option<ErrorCode> {
        self.0.parse().ok()
    }
}

impl From<ErrorCode> for DiagnosticCode {
    fn from(code: ErrorCode) -> Self {
        DiagnosticCode(Cow::Borrowed(code.as_str()))
    }
}

impl From<&'static str> for DiagnosticCode {
    fn from(code: &'static str) -> Self {
        DiagnosticCode(Cow::Borrowed(code))
    }
}

impl From<String> for DiagnosticCode {
    fn from(code: String) -> Self {
        DiagnosticCode(Cow::Owned(code))
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a diagnostic points: a compilation unit and optionally a line.
///
/// `unit` is the unit's display name (a qualified type name such as
/// `app.model.User`, or a resource path). Lines are 1-based.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Location {
    pub unit: String,
    pub line: Option<u32>,
}

impl Location {
    pub fn new(unit: impl Into<String>, line: u32) -> Self {
        Location {
            unit: unit.into(),
            line: Some(line),
        }
    }

    /// A location covering the whole unit.
    pub fn unit(unit: impl Into<String>) -> Self {
        Location {
            unit: unit.into(),
            line: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.unit),
            None => write!(f, "{}", self.unit),
        }
    }
}

/// A structured compiler message.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    /// Stable code for searchability and counting.
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Main message.
    pub message: String,
    /// Unit and line this diagnostic refers to.
    pub location: Option<Location>,
    /// Additional notes providing context.
    pub notes: Vec<String>,
}

impl Diagnostic {
    fn new_with_severity(code: impl Into<DiagnosticCode>, severity: Severity) -> Self {
        Diagnostic {
            code: code.into(),
            severity,
            message: String::new(),
            location: None,
            notes: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    #[cold]
    pub fn error(code: impl Into<DiagnosticCode>) -> Self {
        Self::new_with_severity(code, Severity::Error)
    }

    /// Create a new warning diagnostic.
    #[cold]
    pub fn warning(code: impl Into<DiagnosticCode>) -> Self {
        Self::new_with_severity(code, Severity::Warning)
    }

    /// Create a new informational note.
    pub fn note(code: impl Into<DiagnosticCode>) -> Self {
        Self::new_with_severity(code, Severity::Note)
    }

    /// Set the main message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Point the diagnostic at a line of a unit.
    pub fn at(mut self, unit: impl Into<String>, line: u32) -> Self {
        self.location = Some(Location::new(unit, line));
        self
    }

    /// Point the diagnostic at a whole unit.
    pub fn in_unit(mut self, unit: impl Into<String>) -> Self {
        self.location = Some(Location::unit(unit));
        self
    }

    /// Add a note providing additional context.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// The line this diagnostic points at, if any.
    pub fn line(&self) -> Option<u32> {
        self.location.as_ref().and_then(|loc| loc.line)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({location})")?;
        }
        Ok(())
    }
}
