//! Tracing subscriber setup for hosts that do not bring their own.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an `EnvFilter`.
///
/// Defaults to info level for this crate if `RUST_LOG` is not set. Safe
/// to call once; a host that already installed a subscriber should skip
/// it.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cloudberry_client=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
