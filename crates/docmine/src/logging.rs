//! Process-wide tracing setup for binaries embedding this crate.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber, honoring `RUST_LOG` and
/// defaulting to `info`. Records emitted through the `log` facade are
/// bridged into tracing. Calling this more than once is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
