//! Tracing subscriber setup for the demo binaries.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a formatting subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `debug` when `verbose` is set and
/// `info` when it is not.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {e}"))
}
