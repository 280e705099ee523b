//! # CortOS Demo Firmware
//!
//! Three threads exercising the kernel on an LPC1768:
//!
//! | Thread | Behavior |
//! |--------|----------|
//! | `producer` | Takes the shared mutex, works, releases, yields |
//! | `consumer` | Same mutex, longer hold; yields only when contended |
//! | `heartbeat` | Sleeps 100 ticks between short bursts |
//!
//! With the `edf` feature `heartbeat` is periodic with a 100-tick deadline
//! and preempts the others when it wakes.
//!
//! Between locks the consumer runs until its timeslice expires; if that
//! happens while it holds the mutex, the producer blocks on it and is
//! handed the mutex on release.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use panic_halt as _;

use cortos::kernel;
use cortos::mutex::MutexId;
#[cfg(feature = "edf")]
use cortos::thread::Deadline;

/// The only mutex, created first.
const SHARED: MutexId = MutexId::from_index(0);

static COUNTER: AtomicU32 = AtomicU32::new(0);
static BEATS: AtomicU32 = AtomicU32::new(0);

fn work(iterations: u32) {
    for _ in 0..iterations {
        core::hint::spin_loop();
    }
}

// ---------------------------------------------------------------------------
// Thread entry points
// ---------------------------------------------------------------------------

extern "C" fn producer() -> ! {
    loop {
        kernel::lock_mutex(SHARED);
        COUNTER.fetch_add(1, Ordering::Relaxed);
        work(1_000);
        kernel::release_mutex(SHARED);
        kernel::yield_now();
    }
}

extern "C" fn consumer() -> ! {
    loop {
        kernel::lock_mutex(SHARED);
        let seen = COUNTER.load(Ordering::Relaxed);
        work(20_000);
        COUNTER.store(seen.saturating_sub(1), Ordering::Relaxed);
        kernel::release_mutex(SHARED);
    }
}

extern "C" fn heartbeat() -> ! {
    loop {
        BEATS.fetch_add(1, Ordering::Relaxed);
        work(500);
        kernel::sleep(100);
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

#[entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().expect("core peripherals already taken");

    kernel::init(&mut cp.SCB);

    let shared = kernel::create_mutex().expect("failed to create shared mutex");
    assert_eq!(shared, SHARED);

    kernel::create_thread(producer).expect("failed to create producer");
    kernel::create_thread(consumer).expect("failed to create consumer");

    #[cfg(feature = "edf")]
    kernel::create_thread_with_deadline(
        heartbeat,
        Deadline {
            relative: 100,
            period: 100,
        },
    )
    .expect("failed to create heartbeat");
    #[cfg(not(feature = "edf"))]
    kernel::create_thread(heartbeat).expect("failed to create heartbeat");

    kernel::start(&mut cp.SYST);

    // Only reached if start failed.
    loop {
        cortex_m::asm::wfi();
    }
}
