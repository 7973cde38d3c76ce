//! The compile engine seam.
//!
//! The orchestrator never looks inside a unit: it hands a [`TypeUnit`] to a
//! [`CompileEngine`] and gets a [`CompileResult`] back. Compiling the same
//! unit twice is allowed and overwrites earlier artifacts.

use std::path::PathBuf;
use std::process::Command;

use ori_diagnostic::{Diagnostic, DiagnosticCode, ErrorCode, Location, Severity};

use crate::unit::{CompileResult, CompiledClass, TypeUnit};

/// Raw output lines kept as notes when an engine fails silently.
const MAX_RAW_NOTES: usize = 10;

/// Compiles one unit at a time.
pub trait CompileEngine: Send + Sync {
    fn compile(&self, unit: &TypeUnit) -> CompileResult;
}

/// Runs an external compiler once per unit.
///
/// Arguments may contain the placeholders `{file}` (source path), `{type}`
/// (qualified type name) and `{out}` (output directory). When no argument
/// mentions `{file}`, the source path is appended.
///
/// Output lines of the form `path:line: severity[CODE]: message` become
/// diagnostics on the unit; other lines are ignored unless the command fails
/// without reporting an error.
#[derive(Clone, Debug)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    output_dir: Option<PathBuf>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        CommandEngine {
            program: program.into(),
            args: Vec::new(),
            output_dir: None,
        }
    }

    /// Split a whitespace-separated command line. `None` if it is blank.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut words = command_line.split_whitespace();
        let program = words.next()?;
        Some(CommandEngine::new(program).args(words))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    fn command_for(&self, unit: &TypeUnit) -> Command {
        let file = unit.path.display().to_string();
        let out = self
            .output_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();

        let mut command = Command::new(&self.program);
        let mut has_file = false;
        for arg in &self.args {
            has_file |= arg.contains("{file}");
            command.arg(
                arg.replace("{file}", &file)
                    .replace("{type}", unit.name.as_str())
                    .replace("{out}", &out),
            );
        }
        if !has_file {
            command.arg(&unit.path);
        }
        command
    }
}

impl CompileEngine for CommandEngine {
    #[tracing::instrument(level = "debug", skip_all, fields(unit = %unit.name))]
    fn compile(&self, unit: &TypeUnit) -> CompileResult {
        let output = match self.command_for(unit).output() {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(program = %self.program, %err, "cannot launch compile engine");
                let diagnostic = Diagnostic::error(ErrorCode::E7003)
                    .with_message(format!("cannot launch `{}`: {err}", self.program))
                    .in_unit(unit.name.as_str());
                return CompileResult::failed(unit.name.clone(), vec![diagnostic]);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut diagnostics = Vec::new();
        let mut raw = Vec::new();
        for line in stdout.lines().chain(stderr.lines()) {
            match EngineLine::parse(line) {
                Some(parsed) => diagnostics.push(parsed.into_diagnostic(unit)),
                None if !line.trim().is_empty() => raw.push(line.to_string()),
                None => {}
            }
        }

        let success = output.status.success();
        tracing::debug!(success, diagnostics = diagnostics.len(), "engine finished");

        if success {
            let mut result = CompileResult::compiled(CompiledClass::on_disk(unit.name.clone()));
            result.diagnostics = diagnostics;
            return result;
        }

        if !diagnostics.iter().any(Diagnostic::is_error) {
            let mut diagnostic = Diagnostic::error(ErrorCode::E7004)
                .with_message(format!("compile engine failed ({})", output.status))
                .in_unit(unit.name.as_str());
            for line in raw.into_iter().take(MAX_RAW_NOTES) {
                diagnostic = diagnostic.with_note(line);
            }
            diagnostics.push(diagnostic);
        }
        CompileResult::failed(unit.name.clone(), diagnostics)
    }
}

/// One parsed `path:line: severity[CODE]: message` line.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct EngineLine {
    pub path: String,
    pub line: u32,
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

impl EngineLine {
    /// Parse an engine output line. `None` for anything else.
    ///
    /// The code is optional (`path:3: warning: message`).
    pub fn parse(line: &str) -> Option<Self> {
        let (head, rest) = line.split_once(": ")?;
        let (path, line_no) = head.rsplit_once(':')?;
        let line_no = line_no.trim().parse().ok()?;

        let (label, message) = rest.split_once(": ")?;
        let (severity, code) = match label.split_once('[') {
            Some((severity, code)) => (severity, code.strip_suffix(']')?),
            None => (label, "engine"),
        };
        let severity = match severity.trim() {
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            "note" => Severity::Note,
            "help" => Severity::Help,
            _ => return None,
        };

        Some(EngineLine {
            path: path.to_string(),
            line: line_no,
            severity,
            code: code.to_string(),
            message: message.trim().to_string(),
        })
    }

    /// Attach to `unit`; the reported path is kept as a note when it is not
    /// the unit's own source.
    pub fn into_diagnostic(self, unit: &TypeUnit) -> Diagnostic {
        let mut notes = Vec::new();
        if std::path::Path::new(&self.path) != unit.path {
            notes.push(format!("reported in {}", self.path));
        }
        Diagnostic {
            code: DiagnosticCode::from(self.code),
            severity: self.severity,
            message: self.message,
            location: Some(Location::new(unit.name.as_str(), self.line)),
            notes,
        }
    }
}
