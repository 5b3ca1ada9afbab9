//! Diagnostic logging for test runs, written to stderr.
//!
//! Unrelated to the per-script summary on stdout (`io/reporter`) and to the
//! trace file (`io/trace_writer`); neither is affected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set. Otherwise only warnings are shown, or this
/// crate's `info` events as well when `verbose` is on.
///
/// ```bash
/// RUST_LOG=vt_tester=debug vt-tester run t/select.test
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,vt_tester=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact().with_target(false))
        .init();
}
