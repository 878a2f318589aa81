//! Process-wide facade: interrupt flag and platform constants.
//!
//! The interpreter is single-threaded and cooperative; the only asynchrony
//! is SIGINT. The handler cannot receive user data, so the flag lives here
//! as a process singleton. Everything else threads through explicit driver
//! state.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Interpreter version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Standard library revision the interpreter targets.
pub const STD_VERSION: u32 = 210503;

/// Digits of precision used when rendering floating point values.
pub const OUTPUT_PRECISION: usize = 8;

/// Delimiter between entries of a search-path list.
pub const PATH_DELIMITER: char = if cfg!(windows) { ';' } else { ':' };

/// Platform name as reported in AST dumps.
pub const PLATFORM: &str = if cfg!(windows) { "Win32" } else { "Unix" };

static INTERRUPT: AtomicBool = AtomicBool::new(false);

/// Raise the interrupt flag. Safe to call from a signal handler thread.
pub fn raise_interrupt() {
    INTERRUPT.store(true, Ordering::SeqCst);
}

/// Consume the interrupt flag, returning whether it was raised.
pub fn take_interrupt() -> bool {
    INTERRUPT.swap(false, Ordering::SeqCst)
}

/// Cooperative poll point. Drains a pending interrupt into an error.
pub fn poll() -> Result<()> {
    if take_interrupt() {
        Err(Error::Interrupt)
    } else {
        Ok(())
    }
}
