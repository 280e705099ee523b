//! # Context-Switch Protocol
//!
//! The three exception-level entry points, as plain calls on the
//! [`Scheduler`]. The arch layer forwards its handlers here; host tests call
//! them directly with a simulated PSP.
//!
//! | Exception | Priority | Role |
//! |-----------|----------|------|
//! | SVCall    | highest  | voluntary yield → decision |
//! | SysTick   | low      | sleep timers, timeslice → decision |
//! | PendSV    | lowest   | applies the decision (PSP swap) |
//!
//! Decisions are only ever made in SVCall and SysTick; PendSV only swaps
//! stacks, after every other pending exception has run.

use log::trace;

use crate::arena::StackPointer;
use crate::config::DEFAULT_TIMESLICE;
use crate::frame::SOFTWARE_FRAME_BYTES;
use crate::policy::Policy;
use crate::scheduler::Scheduler;
use crate::syscall::Syscall;
use crate::thread::{ThreadId, ThreadStatus};

/// Bytes between the PSP seen by SysTick and the saved context. PendSV
/// pushes `r4`–`r11` on top of the hardware frame that is already there.
pub const TICK_FRAME_OFFSET: usize = SOFTWARE_FRAME_BYTES;

/// Same for SVCall. The handler is a trampoline that leaves PSP untouched.
pub const SERVICE_CALL_FRAME_OFFSET: usize = SOFTWARE_FRAME_BYTES;

impl<P: Policy> Scheduler<P> {
    /// SysTick. Returns `true` when the deferred switch must be pended.
    pub fn on_tick(&mut self, live_sp: StackPointer) -> bool {
        if !self.is_started() {
            return false;
        }
        self.ticks += 1;

        let running = self.running;
        let running_thread = running.and_then(|id| self.threads.get(id)).copied();
        let idle_running = running.is_some() && running == self.idle;
        let switch_pending = self.switch_pending;
        let mut reschedule = false;

        for (i, t) in self.threads.as_mut_slice().iter_mut().enumerate() {
            if Some(ThreadId::new(i)) == running {
                continue;
            }
            match t.status {
                ThreadStatus::Sleeping => {
                    t.timer = t.timer.saturating_sub(1);
                    if t.timer == 0 {
                        t.status = ThreadStatus::Waiting;
                        t.timer = DEFAULT_TIMESLICE;
                        t.release();
                        trace!("thread {} woke up", i);
                        if let Some(r) = &running_thread {
                            if idle_running || self.policy.preempts(t, r) {
                                reschedule = true;
                            }
                        }
                    }
                }
                _ if t.has_deadline() => {
                    t.time_to_deadline = t.time_to_deadline.saturating_sub(1);
                }
                _ => {}
            }
        }

        if let Some(t) = running.and_then(|id| self.threads.get_mut(id)) {
            if t.status == ThreadStatus::Running {
                if t.has_deadline() {
                    t.time_to_deadline = t.time_to_deadline.saturating_sub(1);
                }
                // A selected thread that has not been switched in yet has
                // not used any of its slice.
                if !switch_pending {
                    t.timer = t.timer.saturating_sub(1);
                    if t.timer == 0 {
                        t.timer = DEFAULT_TIMESLICE;
                        reschedule = true;
                    }
                }
            }
        }

        if reschedule {
            self.schedule(live_sp, TICK_FRAME_OFFSET);
            self.switch_pending = true;
        }
        reschedule
    }

    /// SVCall. Returns `true` when the deferred switch must be pended.
    pub fn on_service_call(&mut self, call: Syscall, live_sp: StackPointer) -> bool {
        if !self.is_started() {
            return false;
        }
        match call {
            Syscall::Yield => {
                self.yield_current();
                self.schedule(live_sp, SERVICE_CALL_FRAME_OFFSET);
                self.switch_pending = true;
                true
            }
        }
    }

    /// PendSV. `saved_sp` is the PSP after the handler pushed `r4`–`r11`;
    /// returns the stack pointer to restore from.
    ///
    /// Without a pending decision the interrupted thread resumes. Otherwise
    /// the thread owning `saved_sp` records it, whatever the decision-time
    /// snapshot said.
    pub fn on_deferred_switch(&mut self, saved_sp: StackPointer) -> StackPointer {
        if !core::mem::take(&mut self.switch_pending) {
            return saved_sp;
        }
        if let Some(outgoing) = self.threads.stack_owner(saved_sp).and_then(|id| self.threads.get_mut(id)) {
            outgoing.stack_pointer = saved_sp;
        }
        self.running
            .and_then(|id| self.threads.get(id))
            .map_or(saved_sp, |t| t.stack_pointer)
    }

    /// A running thread that yields gets a fresh timeslice and, under EDF,
    /// starts its next job.
    fn yield_current(&mut self) {
        if let Some(t) = self.running.and_then(|id| self.threads.get_mut(id)) {
            if t.status == ThreadStatus::Running {
                t.timer = DEFAULT_TIMESLICE;
                t.release();
            }
        }
    }
}
