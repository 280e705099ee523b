//! # Kernel Errors
//!
//! Capacity exhaustion and lifecycle misuse are reported as values; the
//! kernel never retries and never aborts on them.

use core::fmt;

/// Failure of a kernel creation or lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Every application thread slot is taken.
    ThreadTableFull,
    /// The stack arena cannot fit another thread stack.
    StackArenaExhausted,
    /// Every mutex slot is taken.
    MutexTableFull,
    /// `start` was called before any thread was created.
    NoThreads,
    /// The kernel is already running; the thread population is fixed.
    AlreadyStarted,
    /// A relative deadline of `u32::MAX` is reserved for "no deadline".
    InvalidDeadline,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::ThreadTableFull => f.write_str("thread table is full"),
            KernelError::StackArenaExhausted => f.write_str("stack arena is exhausted"),
            KernelError::MutexTableFull => f.write_str("mutex table is full"),
            KernelError::NoThreads => f.write_str("no threads to start"),
            KernelError::AlreadyStarted => f.write_str("kernel already started"),
            KernelError::InvalidDeadline => f.write_str("deadline out of range"),
        }
    }
}
