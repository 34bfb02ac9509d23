//! Tracing initialization
//!
//! `RUST_LOG` wins when set; otherwise the level follows the CLI verbosity.
//! Logs go to stderr so answers on stdout stay clean.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::Verbosity;

static INIT: Once = Once::new();

/// Filter directive for a verbosity level
pub fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "ollamarag=error",
        Verbosity::Normal => "ollamarag=warn",
        Verbosity::Verbose => "ollamarag=info",
        Verbosity::VeryVerbose => "ollamarag=debug",
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbosity: Verbosity) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(matches!(verbosity, Verbosity::VeryVerbose)),
            )
            .with(filter)
            .init();
    });
}
