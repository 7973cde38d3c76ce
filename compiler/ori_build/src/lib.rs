//! Ori Build - incremental build orchestration.
//!
//! Decides, on every build request, which compilation units must be
//! (re)compiled, drives an external compile engine over them, partitions the
//! results into clean and errant units, aggregates diagnostics into a report,
//! and hands freshly compiled classes to an attached debug session.
//!
//! # Architecture
//!
//! ```text
//! build request
//!     │
//!     ▼
//! ChangeSetResolver ──► ChangeSet::All ──────────────► full rebuild
//!     │                                              (clean + copy output)
//!     ▼                                                   │
//! ChangeSet::Changed ──► DependencyExpander ──┐           │
//!     │                                       ├──► unit set (deduplicated)
//!     └──► resources copied to output         │           │
//! carried-over errant units ──────────────────┘           ▼
//!                                              CompileEngine (per unit)
//!                                                         │
//!                      Partition ◄── consumer chain ──► DiagnosticsAggregator
//!                          │                                  │
//!                          ▼                                  ▼
//!                 HotSwap (clean classes)                BuildReport
//! ```
//!
//! One [`Orchestrator`] instance owns the state that must survive between
//! builds (the errant set and the change baseline) and admits one build at a
//! time.

mod config;
pub mod consumer;
pub mod deps;
pub mod engine;
mod error;
pub mod hot_swap;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod report;
pub mod resolve;
pub mod source_tree;
pub mod unit;

#[cfg(test)]
mod testing;

pub use config::BuildConfig;
pub use consumer::{CompileConsumer, CompileConsumerExt, Partition, PartitionPolicy};
pub use deps::{
    DependencyExpander, DependencySearch, TextualUsageSearch, UsageGraph, UsageIndex,
};
pub use engine::{CommandEngine, CompileEngine};
pub use error::BuildError;
pub use hot_swap::{HotSwap, HotSwapError};
pub use orchestrator::{
    BuildHandle, BuildMode, BuildOutcome, BuildPhase, CancelToken, Orchestrator,
};
pub use output::OutputDir;
pub use progress::{ProgressSink, ProgressSnapshot, ProgressState};
pub use report::{BuildReport, DiagnosticsAggregator, NodeKind, ReportNode};
pub use resolve::{ChangeKind, ChangeSet, ChangeSetResolver, SourceChange};
pub use source_tree::SourceTree;
pub use unit::{CompilationUnit, CompileResult, CompiledClass, ResourceFile, TypeName, TypeUnit};

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
