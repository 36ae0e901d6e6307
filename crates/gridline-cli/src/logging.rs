//! Logging setup for the `gridline` binary
//!
//! Everything goes to stderr so table output on stdout stays pipeable.
//! `RUST_LOG` takes precedence over the default filter.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Grid notices are logged at info by the default sink
const DEFAULT_FILTER: &str = "warn,gridline_core::diagnostics=info";
const VERBOSE_FILTER: &str = "debug,gridline_core=debug,gridline_sources=debug,gridline_grid=debug";

pub fn init(verbose: bool) -> anyhow::Result<()> {
    let default_filter = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let console_layer = fmt::layer()
        .with_target(verbose)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter)
        .boxed();

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()?;

    tracing::debug!(verbose, "logging initialized");
    Ok(())
}
