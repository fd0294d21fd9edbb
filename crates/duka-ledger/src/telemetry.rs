//! Tracing setup for binaries embedding the engine.

use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber for logging.
///
/// ## Log Levels
/// - ERROR: rollback steps that failed (possible inconsistency)
/// - WARN: rejected operations, uncosted units, negative credit
/// - INFO: completed business operations
/// - DEBUG: every store call
///
/// `RUST_LOG` overrides the default filter. Calling this twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,duka=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
