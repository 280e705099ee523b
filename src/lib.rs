//! # CortOS
//!
//! A small preemptive real-time kernel for ARM Cortex-M3 microcontrollers
//! (LPC17xx), with round-robin or earliest-deadline-first scheduling and
//! FIFO mutexes.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                   Application Threads                  │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                 │
//! │   create_thread · start · yield_now · sleep · mutexes  │
//! ├──────────────┬───────────────────┬─────────────────────┤
//! │  Scheduler   │  Switch Protocol  │  Mutexes            │
//! │  scheduler.rs│  switch.rs        │  mutex.rs           │
//! │  ─ schedule()│  ─ on_tick()      │  ─ acquire()        │
//! │  policy.rs   │  ─ on_service_call│  ─ release()        │
//! │  ─ RR / EDF  │  ─ on_deferred_.. │                     │
//! ├──────────────┴───────────────────┴─────────────────────┤
//! │        Threads (thread.rs) · Syscalls (syscall.rs)     │
//! ├────────────────────────────────────────────────────────┤
//! │    Stack Arena (arena.rs) · Initial Frames (frame.rs)  │
//! ├────────────────────────────────────────────────────────┤
//! │          Arch Port (arch/cortex_m3.rs) · sync.rs       │
//! │         PendSV · SVCall · SysTick · First Launch       │
//! ├────────────────────────────────────────────────────────┤
//! │            ARM Cortex-M3 Hardware (Thumb-2)            │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Context Switching
//!
//! Decisions and swaps are split across three exceptions:
//! - **SysTick** counts down sleep timers, deadlines and the running
//!   thread's timeslice, and decides when a switch is due
//! - **SVCall** decides a switch when a thread yields
//! - **PendSV** (lowest priority) saves R4–R11 of the outgoing thread and
//!   resumes the selected one
//!
//! Everything above the arch port is plain Rust over a single
//! [`scheduler::Scheduler`] value and runs on the host for testing.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **Stack arena**: one 8-byte-aligned block, carved top-down into
//!   fixed-size thread stacks below a reserved handler stack
//! - **Fixed tables**: `heapless` vectors and queues sized from `config`
//! - **Critical sections**: `cortex_m::interrupt::free()` for thread-mode
//!   access to kernel state

#![no_std]

pub mod arena;
pub mod config;
pub mod error;
pub mod frame;
pub mod mutex;
pub mod policy;
pub mod scheduler;
pub mod switch;
pub mod syscall;
pub mod thread;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod arch;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod kernel;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod sync;
