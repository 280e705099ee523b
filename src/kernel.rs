//! # Kernel
//!
//! The thread-facing API over the global kernel state in [`crate::sync`].
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()          ← Exception priorities
//!         ├─► kernel::create_thread() ← Register threads (×N)
//!         ├─► kernel::create_mutex()  ← Register mutexes (×M)
//!         └─► kernel::start()         ← Does not return on success
//!               ├─► Add idle thread
//!               ├─► Configure SysTick
//!               └─► Launch first thread via arch::launch()
//! ```

use cortex_m::peripheral::{SCB, SYST};
use log::{info, warn};

use crate::arch::cortex_m3;
use crate::error::KernelError;
use crate::mutex::MutexId;
use crate::sync::with_kernel;
use crate::thread::{Deadline, ThreadEntry, ThreadId};

// ---------------------------------------------------------------------------
// Setup (before start)
// ---------------------------------------------------------------------------

/// Configure the exception priorities the switch protocol relies on.
pub fn init(scb: &mut SCB) {
    cortex_m3::set_interrupt_priorities(scb);
}

/// Register a thread with the default timeslice.
pub fn create_thread(entry: ThreadEntry) -> Result<ThreadId, KernelError> {
    with_kernel(|k| k.create_thread(entry))
}

/// Register a thread with earliest-deadline-first parameters.
pub fn create_thread_with_deadline(entry: ThreadEntry, deadline: Deadline) -> Result<ThreadId, KernelError> {
    with_kernel(|k| k.create_thread_with_deadline(entry, deadline))
}

pub fn create_mutex() -> Result<MutexId, KernelError> {
    with_kernel(|k| k.create_mutex())
}

/// Start scheduling. Only returns, with `false`, if there is nothing to run
/// or the kernel was already started.
pub fn start(syst: &mut SYST) -> bool {
    let first = with_kernel(|k| {
        k.start().map(|sp| k.arena().address_of(sp))
    });
    let first = match first {
        Ok(address) => address,
        Err(e) => {
            warn!("kernel start failed: {}", e);
            return false;
        }
    };

    info!("starting scheduler");
    cortex_m3::configure_systick(syst);
    // SAFETY: `first` is the saved stack pointer of thread 0, at the base of the
    // frame built for it.
    unsafe { cortex_m3::launch(first as *const u32) }
}

// ---------------------------------------------------------------------------
// Thread API
// ---------------------------------------------------------------------------

/// Give up the core. Returns once the calling thread is selected again.
pub fn yield_now() {
    cortex_m3::request_yield();
}

/// Sleep for `ticks` ticks; `0` is a plain yield.
pub fn sleep(ticks: u32) {
    with_kernel(|k| k.sleep_current(ticks));
    yield_now();
}

/// Try to take `mutex`. On `false` the calling thread is already queued and
/// blocked; it should yield and will own the mutex when it runs again.
pub fn acquire_mutex(mutex: MutexId) -> bool {
    with_kernel(|k| match k.current_thread() {
        Some(thread) => k.acquire_mutex(thread, mutex),
        None => false,
    })
}

pub fn release_mutex(mutex: MutexId) {
    with_kernel(|k| {
        if let Some(thread) = k.current_thread() {
            k.release_mutex(thread, mutex);
        }
    });
}

/// Take `mutex`, yielding until the handoff if it is contended.
pub fn lock_mutex(mutex: MutexId) {
    if !acquire_mutex(mutex) {
        yield_now();
    }
}

pub fn current_thread() -> Option<ThreadId> {
    with_kernel(|k| k.current_thread())
}

/// Ticks since start.
pub fn uptime() -> u64 {
    with_kernel(|k| k.uptime())
}
