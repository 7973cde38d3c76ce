use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber, once.
///
/// `RUST_LOG` selects what is logged. Without it nothing is installed unless
/// `verbose` is set, which logs the build at debug level as an indented span
/// tree.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let from_env = std::env::var("RUST_LOG").is_ok();
        if !from_env && !verbose {
            return;
        }

        let filter = if from_env {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new("ori_build=debug,oric=debug")
        };

        if verbose {
            tracing_subscriber::registry()
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .with(filter)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
