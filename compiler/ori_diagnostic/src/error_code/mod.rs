use std::fmt;

/// Error codes owned by the build tooling.
///
/// Engine-reported diagnostics carry their own codes; these cover what the
/// orchestrator itself has to say about a build.
///
/// Format: E#### where the first digit indicates the area:
/// - E7xxx: Build orchestration (output directory, engine plumbing)
/// - E9xxx: Internal compiler errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Build Orchestration Errors (E7xxx)
    /// Output directory could not be cleaned
    E7001,
    /// Source could not be copied to the output directory
    E7002,
    /// Compile engine could not be launched
    E7003,
    /// Unit failed without reporting an error
    E7004,

    // Internal Errors (E9xxx)
    /// Internal compiler error (compile engine panicked)
    E9001,
}

impl ErrorCode {
    /// All error code variants, for exhaustive testing.
    ///
    /// Kept in sync with `as_str()` which is exhaustive (Rust match enforces it).
    pub const ALL: &[ErrorCode] = &[
        ErrorCode::E7001,
        ErrorCode::E7002,
        ErrorCode::E7003,
        ErrorCode::E7004,
        ErrorCode::E9001,
    ];

    /// Get the numeric code as a string (e.g., "E7001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E7001 => "E7001",
            ErrorCode::E7002 => "E7002",
            ErrorCode::E7003 => "E7003",
            ErrorCode::E7004 => "E7004",
            ErrorCode::E9001 => "E9001",
        }
    }

    /// Check if this is a build orchestration error (E7xxx range).
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::E7001 | ErrorCode::E7002 | ErrorCode::E7003 | ErrorCode::E7004
        )
    }

    /// Check if this error aborts the whole build rather than a single unit.
    pub fn is_process_error(&self) -> bool {
        matches!(self, ErrorCode::E7001 | ErrorCode::E7002)
    }

    /// Check if this is an internal compiler error (E9xxx range).
    pub fn is_internal_error(&self) -> bool {
        matches!(self, ErrorCode::E9001)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse an error code string like `"E7001"`.
///
/// Case-insensitive. Derived from [`ErrorCode::ALL`] and [`ErrorCode::as_str()`].
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .find(|code| code.as_str() == upper)
            .copied()
            .ok_or(())
    }
}
