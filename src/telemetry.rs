//! Tracing initialization.
//!
//! Sets up `tracing-subscriber` with console output and an `EnvFilter`. The
//! filter defaults to `info` and can be overridden with the standard
//! `RUST_LOG` environment variable:
//!
//! ```bash
//! RUST_LOG=agora=debug,sqlx=warn agorad
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing with console output.
///
/// Safe to call more than once; subsequent calls are no-ops because
/// `try_init` refuses to install a second global subscriber.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    Ok(())
}
