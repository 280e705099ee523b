//! # Cortos Configuration
//!
//! Compile-time constants governing capacities, timing and interrupt
//! priorities. All limits are fixed at compile time; there is no dynamic allocation.

/// Number of thread registry slots, including the one reserved for the
/// idle thread created by `start`.
pub const MAX_THREADS: usize = 10;

/// Threads an application may create before the kernel is started.
pub const MAX_USER_THREADS: usize = MAX_THREADS - 1;

/// Maximum number of mutexes.
pub const MAX_MUTEXES: usize = 8;

/// Per-thread stack size in bytes. Must hold the deepest call chain plus
/// the 64-byte initial register frame.
pub const THREAD_STACK_SIZE: usize = 512;

/// Bytes at the top of the stack arena reserved for handler (MSP) use.
pub const HANDLER_STACK_SIZE: usize = 1024;

/// Total size of the stack arena in bytes, handler region included.
pub const STACK_ARENA_SIZE: usize = 0x2000;

/// Ticks a thread may run before the timer preempts it.
pub const DEFAULT_TIMESLICE: u32 = 5;

/// SysTick frequency in Hz. One tick is the kernel's unit of time.
pub const TICK_HZ: u32 = 1000;

/// Core clock of the LPC17xx after `SystemInit` (PLL0 at 100 MHz).
pub const SYSTEM_CLOCK_HZ: u32 = 100_000_000;

/// SVCall priority. Highest of the three kernel exceptions.
pub const SVCALL_PRIORITY: u8 = 0x00;

/// SysTick priority. Lowest "real" priority.
pub const SYSTICK_PRIORITY: u8 = 0xF0;

/// PendSV priority. Strictly below SysTick; the LPC17xx implements the
/// upper five priority bits, so the two must differ in those bits.
pub const PENDSV_PRIORITY: u8 = 0xF8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_holds_every_thread_stack() {
        assert!(HANDLER_STACK_SIZE + MAX_THREADS * THREAD_STACK_SIZE <= STACK_ARENA_SIZE);
    }

    #[test]
    fn exception_priorities_are_ordered() {
        // Lower value is more urgent; compare the bits the LPC17xx keeps.
        let significant = |p: u8| p & 0xF8;
        assert!(significant(SVCALL_PRIORITY) < significant(SYSTICK_PRIORITY));
        assert!(significant(SYSTICK_PRIORITY) < significant(PENDSV_PRIORITY));
    }
}
