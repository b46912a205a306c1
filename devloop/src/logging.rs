//! Diagnostic tracing for the devloop binary.
//!
//! Tracing output goes to stderr and is controlled by `RUST_LOG`. It is never
//! part of product output: the state file, the request history and CLI
//! summaries are written the same way whatever the filter says.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Defaults to `warn` when `RUST_LOG` is unset.
///
/// ```bash
/// RUST_LOG=devloop=debug devloop run "add a health endpoint"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
