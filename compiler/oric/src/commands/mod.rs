//! Command handlers for the Ori build driver.

mod build;
mod explain;

pub use build::{
    build_project, parse_build_args, render_report, BuildArgs, ConsoleProgress, OutputFormat,
    ENGINE_ENV,
};
pub use explain::explain_error;
