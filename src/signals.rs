//! Signal Handling for Graceful Shutdown
//!
//! SIGINT/SIGTERM/SIGQUIT set a process-wide flag. Initialization workers
//! stop starting new directories once it is set (skipped directories stay
//! uninitialized and are retried on the next pass) and the tool invoker
//! stops before the next test case. Children already running are not killed.
//!
//! The signal thread is a daemon; it dies with the main thread.

use signal_hook::consts::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::warn;

/// Set once shutdown was requested; polled by initialization workers and
/// the tool invoker
pub static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install signal handlers for graceful shutdown
pub fn install_signal_handlers() -> std::io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGQUIT])?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                let name = match sig {
                    SIGINT => "SIGINT",
                    SIGTERM => "SIGTERM",
                    SIGQUIT => "SIGQUIT",
                    _ => continue,
                };
                warn!("Received {}, finishing in-flight work...", name);
                SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
            }
        })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
