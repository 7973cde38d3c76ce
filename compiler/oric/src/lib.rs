//! Ori build driver.
//!
//! Thin command-line layer over [`ori_build`]: parses flags into a
//! [`BuildConfig`](ori_build::BuildConfig), runs the orchestrator once or in
//! watch mode, and renders each build report with an `ori_diagnostic`
//! emitter.

pub mod commands;
mod tracing_setup;

pub use tracing_setup::init_tracing;
