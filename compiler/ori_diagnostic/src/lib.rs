//! Diagnostic system for build reporting.
//!
//! Every diagnostic carries:
//! - A stable code for searchability and counting (never parse messages)
//! - A severity (error, warning, note, help)
//! - A location: the compilation unit and, when known, the source line
//! - Optional notes with extra context
//!
//! Codes owned by the build tooling itself are enumerated in [`ErrorCode`]
//! and documented through [`ErrorDocs`]. Codes reported by an external
//! compile engine travel as free-form [`DiagnosticCode`]s.

mod diagnostic;
pub mod emitter;
mod error_code;
pub mod errors;

pub use diagnostic::{Diagnostic, DiagnosticCode, Location, Severity};
pub use error_code::ErrorCode;
pub use errors::ErrorDocs;
