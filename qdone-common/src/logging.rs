//! Tracing initialisation.
//!
//! Verbosity is controlled by `--verbose`/`--quiet` (translated by the CLI
//! layer) and falls back to the `QDONE_LOG` environment variable, the same
//! precedence the sibling MTA binary uses for `LOG_LEVEL`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber.
///
/// `verbose` lowers the default filter to `debug`; `quiet` raises it to
/// `warn`. An explicit `QDONE_LOG` always wins over both.
pub fn init(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_env("QDONE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("qdone={default_level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
