//! Compilation units and compile results.
//!
//! A unit is either a logical type backed by a typed source file, or a raw
//! resource file copied verbatim to the output directory. Only type units go
//! through the compile engine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ori_diagnostic::Diagnostic;

/// Fully qualified name of a logical type, e.g. `app.model.User`.
///
/// Cheap to clone: the name is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TypeName(Arc<str>);

impl TypeName {
    pub fn new(name: impl AsRef<str>) -> Self {
        TypeName(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name without its package (`User` for `app.model.User`).
    pub fn simple_name(&self) -> &str {
        self.0.rsplit_once('.').map_or(&*self.0, |(_, simple)| simple)
    }

    /// The package part (`app.model` for `app.model.User`), if any.
    pub fn package(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(package, _)| package)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName::new(name)
    }
}

/// A logical type together with the source file that defines it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeUnit {
    pub name: TypeName,
    pub path: PathBuf,
}

/// A non-type file living in a package directory.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ResourceFile {
    pub path: PathBuf,
    /// Dotted package the file lives in (`None` at a source root).
    pub package: Option<String>,
}

impl ResourceFile {
    /// Path relative to the output directory: the package with `.` replaced
    /// by the path separator, followed by the file name.
    pub fn output_relative_path(&self) -> PathBuf {
        let mut relative = PathBuf::new();
        if let Some(package) = &self.package {
            relative.extend(package.split('.'));
        }
        if let Some(name) = self.path.file_name() {
            relative.push(name);
        }
        relative
    }
}

/// One source artifact eligible for a build pass.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum CompilationUnit {
    Type(TypeUnit),
    Resource(ResourceFile),
}

impl CompilationUnit {
    pub fn path(&self) -> &Path {
        match self {
            CompilationUnit::Type(unit) => &unit.path,
            CompilationUnit::Resource(resource) => &resource.path,
        }
    }

    pub fn as_type(&self) -> Option<&TypeUnit> {
        match self {
            CompilationUnit::Type(unit) => Some(unit),
            CompilationUnit::Resource(_) => None,
        }
    }
}

/// Output of compiling one type, ready for redefinition in a debug session.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CompiledClass {
    pub name: TypeName,
    /// Emitted class bytes, when the engine hands them back in memory.
    pub bytes: Option<Arc<[u8]>>,
}

impl CompiledClass {
    pub fn new(name: TypeName, bytes: impl Into<Arc<[u8]>>) -> Self {
        CompiledClass {
            name,
            bytes: Some(bytes.into()),
        }
    }

    /// A class whose bytes were written straight to the output directory.
    pub fn on_disk(name: TypeName) -> Self {
        CompiledClass { name, bytes: None }
    }
}

/// Outcome of compiling one unit.
#[derive(Clone, Debug)]
pub struct CompileResult {
    pub unit: TypeName,
    /// Whether the engine considers the unit compiled.
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Emitted class, if any.
    pub class: Option<CompiledClass>,
}

impl CompileResult {
    /// A successful result emitting `class`.
    pub fn compiled(class: CompiledClass) -> Self {
        CompileResult {
            unit: class.name.clone(),
            success: true,
            diagnostics: Vec::new(),
            class: Some(class),
        }
    }

    /// A failed result.
    pub fn failed(unit: TypeName, diagnostics: Vec<Diagnostic>) -> Self {
        CompileResult {
            unit,
            success: false,
            diagnostics,
            class: None,
        }
    }

    #[must_use]
    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    /// Errant: the engine failed, or reported at least one error.
    ///
    /// Warnings alone keep a unit clean.
    pub fn is_errant(&self) -> bool {
        !self.success || self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_warning()).count()
    }
}
