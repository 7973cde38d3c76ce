//! Hot class redefinition in an attached debug session.

use std::panic::{self, AssertUnwindSafe};

use crate::unit::CompiledClass;

/// A debug session able to redefine classes in the running program.
pub trait HotSwap: Send + Sync {
    fn redefine(&self, classes: &[CompiledClass]) -> Result<(), HotSwapError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HotSwapError {
    #[error("debug session is no longer connected")]
    Disconnected,

    #[error("class redefinition rejected: {0}")]
    Rejected(String),
}

/// Forward `classes` to `session`. Failures and panics are logged, never
/// propagated. Returns whether the session took the classes.
pub(crate) fn notify(session: &dyn HotSwap, classes: &[CompiledClass]) -> bool {
    tracing::debug!(classes = classes.len(), "redefining classes in debug session");
    match panic::catch_unwind(AssertUnwindSafe(|| session.redefine(classes))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::warn!(%err, "hot swap failed");
            false
        }
        Err(payload) => {
            tracing::warn!(
                panic = %crate::panic_message(payload.as_ref()),
                "hot swap panicked"
            );
            false
        }
    }
}
