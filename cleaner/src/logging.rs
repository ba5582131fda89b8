//! Development-time tracing for debugging the cleaner.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!
//! - **Run ledger (`ledger`)**: The audit trail of a run. Printed to stdout,
//!   optionally appended to `--log`, and serialized into `--json`. Ledger
//!   events are also forwarded to tracing at `info`, so `RUST_LOG=cleaner=info`
//!   shows them interleaved with diagnostics while the default `warn` filter
//!   does not print them a second time.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=cleaner=debug cargo run -- directory ./scenes
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (e.g. from tests sharing a process) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
