use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

static TERMINATE: AtomicBool = AtomicBool::new(false);
static RESTORE_HOOK: OnceLock<Box<dyn Fn() + Send + Sync>> = OnceLock::new();

/// Installs the SIGINT/SIGTERM/SIGHUP handler.
///
/// The handler sets a terminate flag only; the event loop polls it and shuts
/// down cleanly. A second signal restores the terminal and exits at once.
///
/// # Errors
/// Fails if a handler was already installed for this process.
pub fn init() -> Result<()> {
    ctrlc::set_handler(trigger_terminate).context("Failed to install signal handler")
}

/// Requests termination, force-exiting on the second request.
pub fn trigger_terminate() {
    if TERMINATE.swap(true, Ordering::SeqCst) {
        // process::exit() bypasses Drop, so restore the terminal first.
        if let Some(hook) = RESTORE_HOOK.get() {
            hook();
        }
        std::process::exit(130);
    }
}

/// Checks if a terminate signal was received.
pub fn should_terminate() -> bool {
    TERMINATE.load(Ordering::SeqCst)
}

/// Registers a hook run before a forced exit.
///
/// Typically used by the TUI to restore terminal state.
pub fn set_restore_hook<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let _ = RESTORE_HOOK.set(Box::new(hook));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset() {
        TERMINATE.store(false, Ordering::SeqCst);
    }

    #[test]
    fn first_trigger_sets_flag_and_reset_clears_it() {
        reset();
        assert!(!should_terminate());
        trigger_terminate();
        assert!(should_terminate());
        reset();
        assert!(!should_terminate());
    }
}
