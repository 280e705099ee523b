//! # Scheduler
//!
//! The kernel's entire mutable state lives in one [`Scheduler`] value: the
//! thread registry (with the stack arena), the mutex table, the running
//! thread and the selection policy. Every kernel entry point takes it by
//! exclusive reference, so there is never a second writer.
//!
//! ## Scheduling
//!
//! `schedule` is entered from the tick and service-call handlers only:
//! 1. **Snapshot** the outgoing thread's stack pointer from the live PSP,
//!    minus the bytes the deferred switch will push below it, provided the
//!    PSP lies in that thread's own stack
//! 2. **Demote** the outgoing thread to `Waiting` (unless it went to sleep
//!    or blocked on its way out)
//! 3. **Select** via the policy over the application threads, falling back
//!    to the idle thread (always the last slot)
//! 4. **Promote** the selection to `Running`

use log::{debug, trace, warn};

use crate::arena::{StackArena, StackPointer};
use crate::config::MAX_USER_THREADS;
use crate::error::KernelError;
use crate::mutex::{Mutex, MutexId, MutexTable};
use crate::policy::{ActivePolicy, Policy, Selection};
use crate::thread::{idle_thread, Deadline, Thread, ThreadEntry, ThreadId, ThreadRegistry, ThreadStatus};

pub struct Scheduler<P: Policy = ActivePolicy> {
    pub(crate) threads: ThreadRegistry,
    pub(crate) mutexes: MutexTable,
    /// Thread selected by the last decision, `None` before the first one.
    pub(crate) running: Option<ThreadId>,
    /// Set by `start`; always the last registry slot.
    pub(crate) idle: Option<ThreadId>,
    pub(crate) policy: P,
    /// A decision has been made that the deferred switch has not yet applied.
    pub(crate) switch_pending: bool,
    /// Ticks since start.
    pub(crate) ticks: u64,
}

impl<P: Policy> Scheduler<P> {
    pub const fn new() -> Self {
        Self {
            threads: ThreadRegistry::new(),
            mutexes: MutexTable::new(),
            running: None,
            idle: None,
            policy: P::INIT,
            switch_pending: false,
            ticks: 0,
        }
    }

    /// Register a thread with the default timeslice and no deadline.
    pub fn create_thread(&mut self, entry: ThreadEntry) -> Result<ThreadId, KernelError> {
        self.register(entry, None)
    }

    /// Register a thread with earliest-deadline-first parameters.
    pub fn create_thread_with_deadline(
        &mut self,
        entry: ThreadEntry,
        deadline: Deadline,
    ) -> Result<ThreadId, KernelError> {
        self.register(entry, Some(deadline))
    }

    fn register(&mut self, entry: ThreadEntry, deadline: Option<Deadline>) -> Result<ThreadId, KernelError> {
        if self.is_started() {
            return Err(KernelError::AlreadyStarted);
        }
        // The last slot belongs to the idle thread.
        if self.threads.len() >= MAX_USER_THREADS {
            warn!("thread table full ({} threads)", MAX_USER_THREADS);
            return Err(KernelError::ThreadTableFull);
        }

        let id = self.threads.create(entry, deadline).inspect_err(|e| warn!("thread creation failed: {}", e))?;
        debug!(
            "created thread {} ({} stack bytes left)",
            id.index(),
            self.threads.arena().remaining()
        );
        Ok(id)
    }

    pub fn create_mutex(&mut self) -> Result<MutexId, KernelError> {
        self.mutexes.create()
    }

    /// Add the idle thread and make every thread ready.
    ///
    /// No thread is marked running; the caller installs the returned stack
    /// pointer as the PSP and requests the first switch through the
    /// service-call path.
    pub fn start(&mut self) -> Result<StackPointer, KernelError> {
        if self.is_started() {
            return Err(KernelError::AlreadyStarted);
        }
        let first = self.threads.as_slice().first().ok_or(KernelError::NoThreads)?.stack_pointer;

        let idle = self.threads.create(idle_thread, None)?;
        for t in self.threads.as_mut_slice() {
            if t.status == ThreadStatus::Created {
                t.status = ThreadStatus::Waiting;
            }
        }
        self.idle = Some(idle);
        self.running = None;
        self.ticks = 0;

        debug!("kernel started with {} threads", idle.index());
        Ok(first)
    }

    pub fn is_started(&self) -> bool {
        self.idle.is_some()
    }

    /// Pick the next thread and make it `Running`.
    ///
    /// `live_sp` is the outgoing thread's current PSP; its context will be
    /// saved `offset` bytes below it. Returns `None` before `start`.
    pub fn schedule(&mut self, live_sp: StackPointer, offset: usize) -> Option<ThreadId> {
        let idle = self.idle?;

        if let Some(current) = self.running.and_then(|id| self.threads.get_mut(id)) {
            // The PSP lies outside `current`'s stack while a switch to it is
            // pending or half done; its saved context is still valid then.
            if current.stack.contains(live_sp) {
                current.stack_pointer = live_sp.below(offset);
            }
            if current.status == ThreadStatus::Running {
                current.status = ThreadStatus::Waiting;
            }
        }

        let candidates = &self.threads.as_slice()[..idle.index()];
        let next = match self.policy.select(candidates) {
            Selection::Thread(id) => id,
            Selection::Idle => idle,
        };

        if let Some(t) = self.threads.get_mut(next) {
            t.status = ThreadStatus::Running;
        }
        if self.running != Some(next) {
            trace!("switch to thread {}", next.index());
        }
        self.running = Some(next);
        Some(next)
    }

    /// Put the running thread to sleep for `ticks` ticks. The caller must
    /// then yield. Sleeping zero ticks is a plain yield.
    pub fn sleep_current(&mut self, ticks: u32) {
        if ticks == 0 {
            return;
        }
        if let Some(t) = self.running.and_then(|id| self.threads.get_mut(id)) {
            t.timer = ticks;
            t.status = ThreadStatus::Sleeping;
            t.release();
        }
    }

    /// See [`MutexTable::acquire`]. On `false` the caller must yield.
    pub fn acquire_mutex(&mut self, thread: ThreadId, mutex: MutexId) -> bool {
        self.mutexes.acquire(&mut self.threads, thread, mutex)
    }

    /// See [`MutexTable::release`].
    pub fn release_mutex(&mut self, thread: ThreadId, mutex: MutexId) {
        self.mutexes.release(&mut self.threads, thread, mutex)
    }

    pub fn current_thread(&self) -> Option<ThreadId> {
        self.running
    }

    pub fn idle_thread(&self) -> Option<ThreadId> {
        self.idle
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id)
    }

    pub fn status(&self, id: ThreadId) -> Option<ThreadStatus> {
        self.threads.get(id).map(Thread::status)
    }

    /// Registered threads, idle included once started.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn mutex(&self, id: MutexId) -> Option<&Mutex> {
        self.mutexes.get(id)
    }

    pub fn owner(&self, id: MutexId) -> Option<ThreadId> {
        self.mutexes.get(id).and_then(Mutex::owner)
    }

    pub fn uptime(&self) -> u64 {
        self.ticks
    }

    pub fn arena(&self) -> &StackArena {
        self.threads.arena()
    }
}

impl<P: Policy> Default for Scheduler<P> {
    fn default() -> Self {
        Self::new()
    }
}
