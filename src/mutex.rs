//! # Mutexes
//!
//! Fixed-capacity table of mutexes. Each mutex has an owner and a FIFO
//! queue of the threads blocked on it. Contention never spins: a losing
//! thread is marked `Blocked` and stays off the run queue until a release
//! hands the mutex to it directly.
//!
//! Ownership is re-entrant without a count: the owner may acquire again
//! without blocking, and a single release frees the mutex. There is no
//! priority inheritance.

use heapless::{Deque, Vec};
use log::{debug, trace, warn};

use crate::config::{MAX_MUTEXES, MAX_THREADS};
use crate::error::KernelError;
use crate::thread::{ThreadId, ThreadRegistry, ThreadStatus};

/// Table index of a mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutexId(usize);

impl MutexId {
    /// Id of the `index`-th mutex created. Ids are handed out in creation
    /// order starting at zero.
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

pub struct Mutex {
    owner: Option<ThreadId>,
    waiting: Deque<ThreadId, MAX_THREADS>,
}

impl Mutex {
    const fn new() -> Self {
        Self {
            owner: None,
            waiting: Deque::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.owner.is_none()
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    /// Blocked threads, head of the queue first.
    pub fn waiting(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.waiting.iter().copied()
    }
}

pub struct MutexTable {
    mutexes: Vec<Mutex, MAX_MUTEXES>,
}

impl MutexTable {
    pub const fn new() -> Self {
        Self { mutexes: Vec::new() }
    }

    pub fn create(&mut self) -> Result<MutexId, KernelError> {
        let id = MutexId(self.mutexes.len());
        self.mutexes.push(Mutex::new()).map_err(|_| {
            warn!("mutex table full ({} mutexes)", MAX_MUTEXES);
            KernelError::MutexTableFull
        })?;
        debug!("created mutex {}", id.0);
        Ok(id)
    }

    pub fn get(&self, id: MutexId) -> Option<&Mutex> {
        self.mutexes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.mutexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutexes.is_empty()
    }

    /// Take `mutex` for `thread`.
    ///
    /// Succeeds when the mutex is free or already held by `thread`.
    /// Otherwise `thread` joins the back of the waiting queue (once) and
    /// is marked `Blocked`, and `false` is returned.
    pub fn acquire(&mut self, threads: &mut ThreadRegistry, thread: ThreadId, mutex: MutexId) -> bool {
        let Some(m) = self.mutexes.get_mut(mutex.0) else {
            return false;
        };

        match m.owner {
            None => {
                m.owner = Some(thread);
                true
            }
            Some(owner) if owner == thread => true,
            Some(owner) => {
                if !m.waiting.iter().any(|&t| t == thread) && m.waiting.push_back(thread).is_ok() {
                    if let Some(t) = threads.get_mut(thread) {
                        t.status = ThreadStatus::Blocked;
                    }
                    trace!(
                        "thread {} blocked on mutex {} held by thread {}",
                        thread.index(),
                        mutex.0,
                        owner.index()
                    );
                }
                false
            }
        }
    }

    /// Give up `mutex`. No-op unless `thread` owns it.
    ///
    /// If threads are waiting, ownership passes to the head of the queue
    /// and that thread becomes `Waiting` again.
    pub fn release(&mut self, threads: &mut ThreadRegistry, thread: ThreadId, mutex: MutexId) {
        let next = match self.mutexes.get_mut(mutex.0) {
            Some(m) if m.owner == Some(thread) => {
                m.owner = None;
                m.waiting.pop_front()
            }
            _ => return,
        };

        if let Some(next) = next {
            let acquired = self.acquire(threads, next, mutex);
            debug_assert!(acquired);
            if let Some(t) = threads.get_mut(next) {
                t.status = ThreadStatus::Waiting;
            }
            debug!(
                "mutex {} handed from thread {} to thread {}",
                mutex.0,
                thread.index(),
                next.index()
            );
        }
    }
}

impl Default for MutexTable {
    fn default() -> Self {
        Self::new()
    }
}
