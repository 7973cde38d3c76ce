//! JSON Emitter
//!
//! Machine-readable diagnostic output in JSON format.

use std::io::Write;

use crate::{Diagnostic, Severity};

use super::{escape_json, trailing_comma, DiagnosticEmitter};

/// JSON emitter for machine-readable output.
///
/// Writes one array; the build summary, if emitted, is its last element.
pub struct JsonEmitter<W: Write> {
    writer: W,
    first: bool,
}

impl<W: Write> JsonEmitter<W> {
    /// Create a new JSON emitter.
    pub fn new(writer: W) -> Self {
        JsonEmitter {
            writer,
            first: true,
        }
    }

    /// Begin the JSON array output.
    pub fn begin(&mut self) {
        let _ = writeln!(self.writer, "[");
    }

    /// End the JSON array output.
    pub fn end(&mut self) {
        let _ = writeln!(self.writer, "\n]");
    }

    fn separate(&mut self) {
        if !self.first {
            let _ = writeln!(self.writer, ",");
        }
        self.first = false;
    }
}

impl<W: Write> DiagnosticEmitter for JsonEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        self.separate();

        // Build JSON manually (to avoid serde dependency)
        let _ = writeln!(self.writer, "  {{");
        let _ = writeln!(
            self.writer,
            "    \"code\": \"{}\",",
            escape_json(diagnostic.code.as_str())
        );
        let _ = writeln!(self.writer, "    \"severity\": \"{}\",", diagnostic.severity);
        let _ = writeln!(
            self.writer,
            "    \"message\": \"{}\",",
            escape_json(&diagnostic.message)
        );

        match &diagnostic.location {
            Some(location) => {
                let _ = writeln!(
                    self.writer,
                    "    \"unit\": \"{}\",",
                    escape_json(&location.unit)
                );
                match location.line {
                    Some(line) => {
                        let _ = writeln!(self.writer, "    \"line\": {line},");
                    }
                    None => {
                        let _ = writeln!(self.writer, "    \"line\": null,");
                    }
                }
            }
            None => {
                let _ = writeln!(self.writer, "    \"unit\": null,");
                let _ = writeln!(self.writer, "    \"line\": null,");
            }
        }

        let _ = writeln!(self.writer, "    \"notes\": [");
        for (i, note) in diagnostic.notes.iter().enumerate() {
            let comma = trailing_comma(i, diagnostic.notes.len());
            let _ = writeln!(self.writer, "      \"{}\"{}", escape_json(note), comma);
        }
        let _ = writeln!(self.writer, "    ]");

        let _ = write!(self.writer, "  }}");
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }

    fn emit_summary(
        &mut self,
        severity: Severity,
        message: &str,
        error_count: usize,
        warning_count: usize,
    ) {
        self.separate();
        let _ = writeln!(self.writer, "  {{");
        let _ = writeln!(self.writer, "    \"summary\": \"{}\",", escape_json(message));
        let _ = writeln!(self.writer, "    \"severity\": \"{severity}\",");
        let _ = writeln!(self.writer, "    \"errors\": {error_count},");
        let _ = writeln!(self.writer, "    \"warnings\": {warning_count}");
        let _ = write!(self.writer, "  }}");
    }
}
