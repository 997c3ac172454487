//! Initializes structured logging for the `wf` binary.
//!
//! Plain runs get a `tracing_subscriber::fmt` layer on stderr using
//! [`crate::log_format::TextWithSpanIds`] so trace/span ids show up next to
//! each line; `--verbose` lowers the default filter from `warn` to `info`.
//! Level is always overridable via `RUST_LOG`.

use tracing_subscriber::EnvFilter;

use crate::log_format::TextWithSpanIds;

pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if verbose { "info" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .event_format(TextWithSpanIds::new())
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
