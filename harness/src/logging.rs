//! Tracing initialization for harness consumers

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the verbose flag picks between debug
/// and info for harness targets. Safe to call more than once (later calls
/// are no-ops), so test binaries and scenarios can both call it.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        EnvFilter::new("harness=debug,tester=debug,info")
    } else {
        EnvFilter::new("harness=info,tester=info,warn")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or(fallback);

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
