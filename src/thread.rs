//! # Thread Control Entries
//!
//! Each thread owns one entry in a fixed-capacity registry; its index is
//! the thread's identity. Threads are created once, before the kernel
//! starts, and never destroyed.
//!
//! ```text
//!   ┌─────────┐  start   ┌─────────┐  schedule()  ┌─────────┐
//!   │ Created │ ───────► │ Waiting │ ───────────► │ Running │
//!   └─────────┘          └─────────┘ ◄─────────── └─────────┘
//!                          ▲     ▲     preempt /       │
//!               timer = 0  │     │     yield           │ sleep()
//!                ┌──────────┐   ┌─────────┐            │ acquire() fails
//!                │ Sleeping │   │ Blocked │ ◄──────────┤
//!                └──────────┘   └─────────┘            │
//!                     ▲          hand-off              │
//!                     └────────────────────────────────┘
//! ```

use heapless::Vec;

use crate::arena::{StackArena, StackPointer, StackRegion};
use crate::config::{DEFAULT_TIMESLICE, MAX_THREADS, THREAD_STACK_SIZE};
use crate::error::KernelError;
use crate::frame;

/// Thread body. Threads never return.
pub type ThreadEntry = extern "C" fn() -> !;

/// `time_to_deadline` of a thread without a deadline.
pub const NO_DEADLINE: u32 = u32::MAX;

/// Registry index of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

/// Scheduling state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Registered, never run.
    Created,
    /// Ready to run.
    Waiting,
    /// Owns the core.
    Running,
    /// Suspended until its timer reaches zero.
    Sleeping,
    /// Queued on a mutex until it is handed over.
    Blocked,
}

impl ThreadStatus {
    /// Whether the scheduler may pick a thread in this state.
    #[inline]
    pub fn is_runnable(self) -> bool {
        matches!(self, Self::Created | Self::Waiting | Self::Running)
    }
}

/// Earliest-deadline-first parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// Time budget in ticks from each release.
    pub relative: u32,
    /// Release period in ticks; `0` for an aperiodic thread.
    pub period: u32,
}

/// Thread control entry.
#[derive(Clone, Copy)]
pub struct Thread {
    pub(crate) stack_pointer: StackPointer,
    pub(crate) stack: StackRegion,
    entry: ThreadEntry,
    pub(crate) status: ThreadStatus,
    /// Remaining timeslice, or remaining sleep while `Sleeping`.
    pub(crate) timer: u32,
    pub(crate) deadline: u32,
    pub(crate) time_to_deadline: u32,
    pub(crate) period: u32,
}

impl Thread {
    fn new(entry: ThreadEntry, stack: StackRegion, stack_pointer: StackPointer) -> Self {
        Self {
            stack_pointer,
            stack,
            entry,
            status: ThreadStatus::Created,
            timer: DEFAULT_TIMESLICE,
            deadline: NO_DEADLINE,
            time_to_deadline: NO_DEADLINE,
            period: 0,
        }
    }

    pub fn entry(&self) -> ThreadEntry {
        self.entry
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn stack_pointer(&self) -> StackPointer {
        self.stack_pointer
    }

    pub fn stack(&self) -> StackRegion {
        self.stack
    }

    pub fn timer(&self) -> u32 {
        self.timer
    }

    pub fn time_to_deadline(&self) -> u32 {
        self.time_to_deadline
    }

    #[inline]
    pub fn has_deadline(&self) -> bool {
        self.deadline != NO_DEADLINE
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        self.period != 0
    }

    /// Start a new job: the full deadline budget is available again.
    pub(crate) fn release(&mut self) {
        self.time_to_deadline = self.deadline;
    }
}

/// Fixed-capacity thread table plus the arena their stacks come from.
pub struct ThreadRegistry {
    threads: Vec<Thread, MAX_THREADS>,
    arena: StackArena,
}

impl ThreadRegistry {
    pub const fn new() -> Self {
        Self {
            threads: Vec::new(),
            arena: StackArena::new(),
        }
    }

    /// Allocate a stack, build its initial frame and register the thread.
    ///
    /// Leaves the registry untouched on failure.
    pub fn create(&mut self, entry: ThreadEntry, deadline: Option<Deadline>) -> Result<ThreadId, KernelError> {
        if self.threads.is_full() {
            return Err(KernelError::ThreadTableFull);
        }
        if deadline.is_some_and(|d| d.relative == NO_DEADLINE) {
            return Err(KernelError::InvalidDeadline);
        }

        let region = self
            .arena
            .allocate(THREAD_STACK_SIZE)
            .ok_or(KernelError::StackArenaExhausted)?;
        let sp = frame::build(&mut self.arena, region, entry).ok_or(KernelError::StackArenaExhausted)?;

        let mut thread = Thread::new(entry, region, sp);
        if let Some(d) = deadline {
            thread.deadline = d.relative;
            thread.time_to_deadline = d.relative;
            thread.period = d.period;
        }

        let id = ThreadId::new(self.threads.len());
        self.threads
            .push(thread)
            .map_err(|_| KernelError::ThreadTableFull)?;
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id.0)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(id.0)
    }

    /// The thread whose stack holds `sp`.
    pub fn stack_owner(&self, sp: StackPointer) -> Option<ThreadId> {
        self.threads.iter().position(|t| t.stack.contains(sp)).map(ThreadId::new)
    }

    pub fn as_slice(&self) -> &[Thread] {
        &self.threads
    }

    pub fn as_mut_slice(&mut self) -> &mut [Thread] {
        &mut self.threads
    }

    pub fn arena(&self) -> &StackArena {
        &self.arena
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of the idle thread: sleep the core until the next interrupt.
pub extern "C" fn idle_thread() -> ! {
    loop {
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        cortex_m::asm::wfi();
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{entry_address, XPSR_THUMB};

    extern "C" fn body() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn created_thread_starts_clean() {
        let mut registry = ThreadRegistry::new();
        let id = registry.create(body, None).unwrap();
        let thread = registry.get(id).unwrap();

        assert_eq!(id.index(), 0);
        assert_eq!(thread.status(), ThreadStatus::Created);
        assert_eq!(thread.timer(), DEFAULT_TIMESLICE);
        assert!(!thread.has_deadline());
        assert!(!thread.is_periodic());
        assert!(thread.stack().contains(thread.stack_pointer()));
    }

    #[test]
    fn created_thread_has_a_restorable_frame() {
        let mut registry = ThreadRegistry::new();
        let id = registry.create(body, None).unwrap();
        let sp = registry.get(id).unwrap().stack_pointer();

        let frame = frame::read(registry.arena(), sp).unwrap();
        assert_eq!(frame.hardware.pc, entry_address(body));
        assert_eq!(frame.hardware.xpsr, XPSR_THUMB);
    }

    #[test]
    fn deadline_parameters_are_recorded() {
        let mut registry = ThreadRegistry::new();
        let id = registry
            .create(body, Some(Deadline { relative: 20, period: 50 }))
            .unwrap();
        let thread = registry.get(id).unwrap();

        assert!(thread.has_deadline());
        assert!(thread.is_periodic());
        assert_eq!(thread.time_to_deadline(), 20);
    }

    #[test]
    fn reserved_deadline_is_rejected() {
        let mut registry = ThreadRegistry::new();
        let remaining = registry.arena().remaining();
        let err = registry.create(
            body,
            Some(Deadline {
                relative: NO_DEADLINE,
                period: 10,
            }),
        );

        assert_eq!(err, Err(KernelError::InvalidDeadline));
        assert!(registry.is_empty());
        assert_eq!(registry.arena().remaining(), remaining);

        let id = registry
            .create(body, Some(Deadline { relative: NO_DEADLINE - 1, period: 0 }))
            .unwrap();
        assert!(registry.get(id).unwrap().has_deadline());
    }

    #[test]
    fn stack_owner_finds_the_enclosing_stack() {
        let mut registry = ThreadRegistry::new();
        let a = registry.create(body, None).unwrap();
        let b = registry.create(body, None).unwrap();
        let stack_a = registry.get(a).unwrap().stack();
        let stack_b = registry.get(b).unwrap().stack();

        assert_eq!(registry.stack_owner(stack_a.bottom()), Some(a));
        assert_eq!(registry.stack_owner(registry.get(b).unwrap().stack_pointer()), Some(b));
        // The top is one past the stack.
        assert_ne!(registry.stack_owner(stack_b.top()), Some(b));
        assert_eq!(registry.stack_owner(StackPointer::from_word(0)), None);
    }

    #[test]
    fn full_table_is_rejected() {
        let mut registry = ThreadRegistry::new();
        for _ in 0..MAX_THREADS {
            registry.create(body, None).unwrap();
        }
        assert_eq!(registry.create(body, None), Err(KernelError::ThreadTableFull));
        assert_eq!(registry.len(), MAX_THREADS);
    }

    #[test]
    fn runnable_states() {
        assert!(ThreadStatus::Created.is_runnable());
        assert!(ThreadStatus::Waiting.is_runnable());
        assert!(ThreadStatus::Running.is_runnable());
        assert!(!ThreadStatus::Sleeping.is_runnable());
        assert!(!ThreadStatus::Blocked.is_runnable());
    }
}
