//! # Selection Policies
//!
//! Pure thread-selection functions over the application threads (the idle
//! thread is never a candidate). Both are total: when nothing is eligible
//! they answer [`Selection::Idle`] instead of looping.
//!
//! The policy in effect is chosen at build time: round-robin by default,
//! earliest-deadline-first with the `edf` feature.

use crate::thread::{Thread, ThreadId};

/// Outcome of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Thread(ThreadId),
    /// No application thread can run.
    Idle,
}

/// A thread-selection policy.
pub trait Policy {
    /// Initial policy state, usable in a `static`.
    const INIT: Self;

    /// Pick the next thread among `candidates`.
    fn select(&mut self, candidates: &[Thread]) -> Selection;

    /// Whether a thread that just woke up should displace `running` at once.
    fn preempts(&self, woken: &Thread, running: &Thread) -> bool;
}

/// Next eligible thread after `after`, wrapping. The thread at `after`
/// itself is considered last.
pub fn round_robin(candidates: &[Thread], after: Option<usize>) -> Selection {
    let n = candidates.len();
    let start = match after {
        Some(i) if i < n => i + 1,
        _ => 0,
    };

    (0..n)
        .map(|k| (start + k) % n)
        .find(|&i| candidates[i].status.is_runnable())
        .map_or(Selection::Idle, |i| Selection::Thread(ThreadId::new(i)))
}

/// Eligible thread with the least time to its deadline; ties go to the
/// lowest index.
pub fn earliest_deadline(candidates: &[Thread]) -> Selection {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, t)| t.status.is_runnable())
        .min_by_key(|(_, t)| t.time_to_deadline)
        .map_or(Selection::Idle, |(i, _)| Selection::Thread(ThreadId::new(i)))
}

/// Round-robin over the application threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobin {
    /// Last application thread selected.
    last: Option<usize>,
}

impl Policy for RoundRobin {
    const INIT: Self = Self { last: None };

    fn select(&mut self, candidates: &[Thread]) -> Selection {
        let selection = round_robin(candidates, self.last);
        if let Selection::Thread(id) = selection {
            self.last = Some(id.index());
        }
        selection
    }

    fn preempts(&self, _woken: &Thread, _running: &Thread) -> bool {
        false
    }
}

/// Earliest-deadline-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarliestDeadlineFirst;

impl Policy for EarliestDeadlineFirst {
    const INIT: Self = Self;

    fn select(&mut self, candidates: &[Thread]) -> Selection {
        earliest_deadline(candidates)
    }

    fn preempts(&self, woken: &Thread, running: &Thread) -> bool {
        woken.is_periodic() && woken.time_to_deadline < running.time_to_deadline
    }
}

#[cfg(not(feature = "edf"))]
pub type ActivePolicy = RoundRobin;

#[cfg(feature = "edf")]
pub type ActivePolicy = EarliestDeadlineFirst;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{Deadline, ThreadRegistry, ThreadStatus};

    extern "C" fn body() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn registry(n: usize) -> ThreadRegistry {
        let mut registry = ThreadRegistry::new();
        for _ in 0..n {
            registry.create(body, None).unwrap();
        }
        for t in registry.as_mut_slice() {
            t.status = ThreadStatus::Waiting;
        }
        registry
    }

    fn with_deadlines(deadlines: &[u32]) -> ThreadRegistry {
        let mut registry = ThreadRegistry::new();
        for &d in deadlines {
            registry
                .create(body, Some(Deadline { relative: d, period: 0 }))
                .unwrap();
        }
        for t in registry.as_mut_slice() {
            t.status = ThreadStatus::Waiting;
        }
        registry
    }

    fn picked(selection: Selection) -> usize {
        match selection {
            Selection::Thread(id) => id.index(),
            Selection::Idle => panic!("expected a thread"),
        }
    }

    #[test]
    fn round_robin_gives_each_thread_one_turn() {
        let registry = registry(4);
        let mut policy = RoundRobin::INIT;

        let mut seen = [0u32; 4];
        for _ in 0..4 {
            seen[picked(policy.select(registry.as_slice()))] += 1;
        }
        assert_eq!(seen, [1, 1, 1, 1]);
    }

    #[test]
    fn round_robin_cycles_in_index_order() {
        let registry = registry(3);
        let mut policy = RoundRobin::INIT;

        let order: [usize; 6] = core::array::from_fn(|_| picked(policy.select(registry.as_slice())));
        assert_eq!(order, [0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn round_robin_skips_sleeping_and_blocked() {
        let mut registry = registry(4);
        registry.as_mut_slice()[1].status = ThreadStatus::Sleeping;
        registry.as_mut_slice()[2].status = ThreadStatus::Blocked;

        assert_eq!(picked(round_robin(registry.as_slice(), Some(0))), 3);
        assert_eq!(picked(round_robin(registry.as_slice(), Some(3))), 0);
    }

    #[test]
    fn round_robin_reselects_the_only_eligible_thread() {
        let mut registry = registry(3);
        registry.as_mut_slice()[0].status = ThreadStatus::Sleeping;
        registry.as_mut_slice()[2].status = ThreadStatus::Blocked;

        assert_eq!(picked(round_robin(registry.as_slice(), Some(1))), 1);
    }

    #[test]
    fn round_robin_falls_back_to_idle() {
        let mut registry = registry(3);
        for t in registry.as_mut_slice() {
            t.status = ThreadStatus::Sleeping;
        }
        registry.as_mut_slice()[1].status = ThreadStatus::Blocked;

        assert_eq!(round_robin(registry.as_slice(), Some(0)), Selection::Idle);
        assert_eq!(round_robin(&[], None), Selection::Idle);
    }

    #[test]
    fn idle_selection_keeps_round_robin_position() {
        let mut registry = registry(3);
        let mut policy = RoundRobin::INIT;
        assert_eq!(picked(policy.select(registry.as_slice())), 0);

        for t in registry.as_mut_slice() {
            t.status = ThreadStatus::Sleeping;
        }
        assert_eq!(policy.select(registry.as_slice()), Selection::Idle);

        for t in registry.as_mut_slice() {
            t.status = ThreadStatus::Waiting;
        }
        assert_eq!(picked(policy.select(registry.as_slice())), 1);
    }

    #[test]
    fn earliest_deadline_wins() {
        let registry = with_deadlines(&[5, 2, 8]);
        assert_eq!(picked(earliest_deadline(registry.as_slice())), 1);
    }

    #[test]
    fn deadline_tie_goes_to_lowest_index() {
        let mut registry = with_deadlines(&[5, 2, 8]);
        registry.as_mut_slice()[1].time_to_deadline = 5;

        assert_eq!(picked(earliest_deadline(registry.as_slice())), 0);
    }

    #[test]
    fn earliest_deadline_ignores_ineligible_threads() {
        let mut registry = with_deadlines(&[5, 2, 8]);
        registry.as_mut_slice()[1].status = ThreadStatus::Blocked;
        registry.as_mut_slice()[0].status = ThreadStatus::Sleeping;

        assert_eq!(picked(earliest_deadline(registry.as_slice())), 2);

        registry.as_mut_slice()[2].status = ThreadStatus::Sleeping;
        assert_eq!(earliest_deadline(registry.as_slice()), Selection::Idle);
    }

    #[test]
    fn threads_without_deadline_run_last() {
        let mut registry = ThreadRegistry::new();
        registry.create(body, None).unwrap();
        registry
            .create(body, Some(Deadline { relative: 100, period: 0 }))
            .unwrap();
        for t in registry.as_mut_slice() {
            t.status = ThreadStatus::Waiting;
        }

        assert_eq!(picked(earliest_deadline(registry.as_slice())), 1);
    }

    #[test]
    fn only_more_urgent_periodic_threads_preempt() {
        let mut registry = ThreadRegistry::new();
        registry
            .create(body, Some(Deadline { relative: 3, period: 10 }))
            .unwrap();
        registry
            .create(body, Some(Deadline { relative: 3, period: 0 }))
            .unwrap();
        registry
            .create(body, Some(Deadline { relative: 7, period: 10 }))
            .unwrap();
        let t = registry.as_slice();

        let edf = EarliestDeadlineFirst;
        assert!(edf.preempts(&t[0], &t[2]));
        assert!(!edf.preempts(&t[1], &t[2]));
        assert!(!edf.preempts(&t[2], &t[0]));
        assert!(!RoundRobin::INIT.preempts(&t[0], &t[2]));
    }
}
