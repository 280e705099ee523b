//! # Kernel State Access
//!
//! The one global [`Scheduler`] and the two ways to reach it:
//! - thread mode, through [`with_kernel`], with interrupts masked so no
//!   tick or service call observes a half-made change
//! - the exception handlers, through [`instance`], whose fixed priorities
//!   (and PendSV's own masking) already keep them apart

use core::cell::UnsafeCell;

use cortex_m::interrupt;

use crate::scheduler::Scheduler;

struct KernelCell(UnsafeCell<Scheduler>);

// SAFETY: single core; every access goes through `with_kernel` or a kernel
// exception handler.
unsafe impl Sync for KernelCell {}

static KERNEL: KernelCell = KernelCell(UnsafeCell::new(Scheduler::new()));

/// Exclusive access to the kernel state from an exception handler.
///
/// # Safety
/// The caller must be a kernel exception handler (or otherwise have
/// interrupts masked) and must not hold the reference past it.
pub(crate) unsafe fn instance() -> &'static mut Scheduler {
    &mut *KERNEL.0.get()
}

/// Run `f` on the kernel state with interrupts disabled.
///
/// Never request a service call from inside: SVC with interrupts masked
/// escalates to HardFault.
#[inline]
pub fn with_kernel<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    // SAFETY: interrupts stay masked for the whole closure.
    interrupt::free(|_cs| f(unsafe { instance() }))
}
