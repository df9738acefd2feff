//! Opt-in `tracing` subscriber for tests and examples.
//!
//! The codec crates only emit events through the `tracing` facade; nothing in
//! the library installs a subscriber. Test binaries that want to see the
//! codec's debug output can call [`init_test_logging`] once.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a compact stderr subscriber filtered by `RUST_LOG`, defaulting to
/// `oxiflate=debug`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("oxiflate_core=debug,oxiflate_deflate=debug,oxiflate_gzip=debug")
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer().with_target(true))
        .try_init();
}
