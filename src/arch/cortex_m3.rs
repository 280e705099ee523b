//! # Cortex-M3 Port Layer
//!
//! Hardware-specific code for the ARMv7-M (Thumb-2) core of the LPC17xx.
//! Forwards SysTick, SVCall and PendSV to the scheduler's switch entry
//! points and performs the actual stack swap.
//!
//! ## Context Switch Mechanism
//!
//! The core uses a split-stack model:
//! - **MSP** (Main Stack Pointer): handlers and the code before `start`
//! - **PSP** (Process Stack Pointer): threads in Thread mode
//!
//! On exception entry the hardware stacks R0–R3, R12, LR, PC and xPSR on
//! the process stack. PendSV saves and restores R4–R11 itself, which
//! completes the full context.
//!
//! ## Interrupt Priorities
//!
//! - SVCall: highest, so a yield is decided immediately
//! - SysTick: low, never delays application interrupts
//! - PendSV: lowest; the swap runs only when nothing else is pending, so
//!   it never interrupts a scheduling decision. It masks interrupts while
//!   swapping, so no decision interrupts it either

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
use cortex_m::register::psp;

use crate::config::{PENDSV_PRIORITY, SVCALL_PRIORITY, SYSTEM_CLOCK_HZ, SYSTICK_PRIORITY, TICK_HZ};
use crate::sync;
use crate::syscall::{self, Syscall};

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure SysTick to fire every `1 / TICK_HZ` seconds from the core
/// clock.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// SVCall above SysTick above PendSV.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // SAFETY: called before the kernel starts; changing system handler
    // priorities cannot break a critical section that does not exist yet.
    unsafe {
        scb.set_priority(SystemHandler::SVCall, SVCALL_PRIORITY);
        scb.set_priority(SystemHandler::SysTick, SYSTICK_PRIORITY);
        scb.set_priority(SystemHandler::PendSV, PENDSV_PRIORITY);
    }
}

// ---------------------------------------------------------------------------
// Thread-mode requests
// ---------------------------------------------------------------------------

/// Pend the deferred context switch.
#[inline]
pub fn trigger_pendsv() {
    SCB::set_pendsv();
}

/// Trap into SVCall with the yield call number. Must not be used inside a
/// critical section (a masked SVC escalates to HardFault).
#[inline]
pub fn request_yield() {
    // SAFETY: SVCall only touches kernel state and returns to the caller
    // once it is scheduled again.
    unsafe {
        asm!("svc {call}", call = const Syscall::Yield.number());
    }
}

// ---------------------------------------------------------------------------
// First thread launch
// ---------------------------------------------------------------------------

/// Move Thread mode onto `psp` and request the first switch.
///
/// Everything runs in one asm block: after `CONTROL.SPSEL` flips, compiled
/// code would address its locals through the new stack.
///
/// # Safety
/// `psp` must be the first thread's saved stack pointer, at the base of
/// its initial frame.
pub unsafe fn launch(psp: *const u32) -> ! {
    asm!(
        "msr psp, r0",
        "movs r0, #2",     // CONTROL.SPSEL = 1
        "msr control, r0",
        "isb",
        "svc {call}",
        "2:",
        "b 2b",
        in("r0") psp,
        call = const Syscall::Yield.number(),
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// PendSV exception handler. Performs the stack swap.
///
/// ## Sequence
/// 1. Mask interrupts; no tick may observe a half-swapped PSP
/// 2. Push R4–R11 onto the outgoing thread's stack (PSP)
/// 3. Ask the scheduler which stack to resume
/// 4. Pop R4–R11 from it and point PSP past them
/// 5. Unmask and return to Thread mode on PSP (hardware pops the rest)
///
/// # Safety
/// Called by the NVIC only. Must follow the exact exception entry/exit
/// convention.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "bl {switch}",
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "cpsie i",
        "mvn r0, #2",        // EXC_RETURN 0xFFFFFFFD: Thread mode, PSP
        "bx r0",
        switch = sym deferred_switch,
    );
}

/// Resolve the stack to resume. Called from PendSV with the outgoing
/// thread's saved stack pointer.
extern "C" fn deferred_switch(saved: *mut u32) -> *mut u32 {
    // SAFETY: PendSV has the lowest priority and runs with interrupts
    // masked; no other handler holds the kernel.
    let kernel = unsafe { sync::instance() };
    let Some(sp) = kernel.arena().pointer_at(saved as usize) else {
        return saved;
    };
    let next = kernel.on_deferred_switch(sp);
    kernel.arena().address_of(next) as *mut u32
}

// ---------------------------------------------------------------------------
// SVCall handler
// ---------------------------------------------------------------------------

/// SVCall exception handler. Passes the stacked frame of the caller to
/// `service_call`.
///
/// # Safety
/// Called by the NVIC only.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn SVCall() {
    naked_asm!(
        "tst lr, #4",
        "ite eq",
        "mrseq r0, msp",
        "mrsne r0, psp",
        "b {dispatch}",
        dispatch = sym service_call,
    );
}

/// Decode and run a service call.
///
/// # Safety
/// `frame` must point at the hardware frame stacked for this SVCall.
unsafe extern "C" fn service_call(frame: *const u32) {
    // The stacked PC is the return address; the SVC precedes it.
    let pc = *frame.add(6) as usize as *const u16;
    let Some(call) = syscall::decode(pc.sub(1).read()) else {
        return;
    };

    let kernel = sync::instance();
    let Some(live) = kernel.arena().pointer_at(psp::read() as usize) else {
        return;
    };
    if kernel.on_service_call(call, live) {
        trigger_pendsv();
    }
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler: the kernel tick.
///
/// # Safety
/// Called by the NVIC only.
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    let kernel = sync::instance();
    // Before launch Thread mode is still on MSP; nothing to schedule.
    let Some(live) = kernel.arena().pointer_at(psp::read() as usize) else {
        return;
    };
    if kernel.on_tick(live) {
        trigger_pendsv();
    }
}
