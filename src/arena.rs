//! # Stack Arena
//!
//! One bounded, 8-byte aligned memory region from which every thread stack
//! is carved. The topmost `HANDLER_STACK_SIZE` bytes are reserved for
//! handler use; thread stacks are handed out top-down beneath it.
//! Allocation is monotonic: stacks are never released.
//!
//! Stack positions are word indices into the arena ([`StackPointer`]).
//! Only the arch layer turns them into real addresses, and only for an
//! arena that lives in a `static` (its address must not move).

use crate::config::{HANDLER_STACK_SIZE, STACK_ARENA_SIZE};

/// Machine word size in bytes.
pub const WORD_SIZE: usize = core::mem::size_of::<u32>();

/// Arena capacity in words.
pub const ARENA_WORDS: usize = STACK_ARENA_SIZE / WORD_SIZE;

/// Exception entry requires the stack pointer to be 8-byte aligned.
const STACK_ALIGN: usize = 8;

/// A position in the arena, counted in words from its lowest address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StackPointer(usize);

impl StackPointer {
    pub const fn from_word(index: usize) -> Self {
        Self(index)
    }

    pub const fn word(self) -> usize {
        self.0
    }

    /// The position `bytes` further down the (full-descending) stack.
    pub const fn below(self, bytes: usize) -> Self {
        Self(self.0.saturating_sub(bytes / WORD_SIZE))
    }

    /// The position `bytes` further up the stack.
    pub const fn above(self, bytes: usize) -> Self {
        Self(self.0 + bytes / WORD_SIZE)
    }
}

/// A thread's private slice of the arena, `[bottom, top)` in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    bottom: usize,
    top: usize,
}

impl StackRegion {
    pub const EMPTY: Self = Self { bottom: 0, top: 0 };

    /// Lowest word of the region.
    pub const fn bottom(&self) -> StackPointer {
        StackPointer(self.bottom)
    }

    /// One past the highest word; the initial stack pointer.
    pub const fn top(&self) -> StackPointer {
        StackPointer(self.top)
    }

    pub const fn len_words(&self) -> usize {
        self.top - self.bottom
    }

    pub const fn contains(&self, sp: StackPointer) -> bool {
        sp.0 >= self.bottom && sp.0 < self.top
    }
}

#[repr(C, align(8))]
struct Words([u32; ARENA_WORDS]);

/// The stack arena and its allocation watermark.
pub struct StackArena {
    words: Words,
    /// Bytes consumed from the top, handler reservation included.
    used: usize,
}

impl StackArena {
    pub const fn new() -> Self {
        Self {
            words: Words([0; ARENA_WORDS]),
            used: HANDLER_STACK_SIZE,
        }
    }

    /// Carve a stack of `size` bytes (rounded up to whole words).
    ///
    /// Returns `None` when the cumulative size, handler region included,
    /// would exceed `STACK_ARENA_SIZE`. If the region top is not 8-byte
    /// aligned it is moved down by one word.
    pub fn allocate(&mut self, size: usize) -> Option<StackRegion> {
        let size = size.next_multiple_of(WORD_SIZE);
        if size == 0 || size > STACK_ARENA_SIZE - self.used {
            return None;
        }

        let mut top = (STACK_ARENA_SIZE - self.used) / WORD_SIZE;
        let bottom = top - size / WORD_SIZE;
        if self.address_of(StackPointer(top)) % STACK_ALIGN != 0 {
            top -= 1;
        }

        self.used += size;
        Some(StackRegion { bottom, top })
    }

    /// Bytes still available for thread stacks.
    pub fn remaining(&self) -> usize {
        STACK_ARENA_SIZE - self.used
    }

    /// Words of an allocated region, for frame construction.
    pub fn region_mut(&mut self, region: StackRegion) -> &mut [u32] {
        &mut self.words.0[region.bottom..region.top]
    }

    /// `len` words starting at `sp`, if they lie inside the arena.
    pub fn words(&self, sp: StackPointer, len: usize) -> Option<&[u32]> {
        self.words.0.get(sp.0..sp.0.checked_add(len)?)
    }

    /// Real address of a stack position.
    pub fn address_of(&self, sp: StackPointer) -> usize {
        self.words.0.as_ptr() as usize + sp.0 * WORD_SIZE
    }

    /// Stack position of a real address, if it falls inside the arena.
    pub fn pointer_at(&self, address: usize) -> Option<StackPointer> {
        let offset = address.checked_sub(self.words.0.as_ptr() as usize)?;
        if offset % WORD_SIZE != 0 || offset / WORD_SIZE > ARENA_WORDS {
            return None;
        }
        Some(StackPointer(offset / WORD_SIZE))
    }
}

impl Default for StackArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_THREADS, THREAD_STACK_SIZE};

    #[test]
    fn first_stack_sits_below_handler_region() {
        let mut arena = StackArena::new();
        let region = arena.allocate(THREAD_STACK_SIZE).unwrap();

        assert_eq!(region.top().word(), (STACK_ARENA_SIZE - HANDLER_STACK_SIZE) / WORD_SIZE);
        assert_eq!(region.len_words(), THREAD_STACK_SIZE / WORD_SIZE);
        assert_eq!(arena.address_of(region.top()) % 8, 0);
    }

    #[test]
    fn stacks_are_carved_top_down_without_overlap() {
        let mut arena = StackArena::new();
        let a = arena.allocate(THREAD_STACK_SIZE).unwrap();
        let b = arena.allocate(THREAD_STACK_SIZE).unwrap();

        assert_eq!(b.top(), a.bottom());
        assert!(b.bottom() < a.bottom());
    }

    #[test]
    fn misaligned_top_moves_down_one_word() {
        let mut arena = StackArena::new();
        // 508 bytes leaves the next top on an odd word.
        let a = arena.allocate(508).unwrap();
        let b = arena.allocate(THREAD_STACK_SIZE).unwrap();

        assert_eq!(arena.address_of(a.top()) % 8, 0);
        assert_eq!(b.top().word(), a.bottom().word() - 1);
        assert_eq!(arena.address_of(b.top()) % 8, 0);
    }

    #[test]
    fn exhaustion_fails_and_keeps_watermark() {
        let mut arena = StackArena::new();
        let fits = (STACK_ARENA_SIZE - HANDLER_STACK_SIZE) / THREAD_STACK_SIZE;
        assert!(fits >= MAX_THREADS);
        for _ in 0..fits {
            assert!(arena.allocate(THREAD_STACK_SIZE).is_some());
        }

        let before = arena.remaining();
        assert_eq!(arena.allocate(THREAD_STACK_SIZE), None);
        assert_eq!(arena.remaining(), before);
    }

    #[test]
    fn zero_sized_request_is_rejected() {
        let mut arena = StackArena::new();
        assert_eq!(arena.allocate(0), None);
    }

    #[test]
    fn addresses_map_back_to_positions() {
        let arena = StackArena::new();
        let sp = StackPointer::from_word(100);
        let address = arena.address_of(sp);

        assert_eq!(arena.pointer_at(address), Some(sp));
        assert_eq!(arena.pointer_at(address + 2), None);
        assert_eq!(arena.pointer_at(arena.address_of(StackPointer::from_word(0)) - 4), None);
    }

    #[test]
    fn pointer_offsets_move_in_words() {
        let sp = StackPointer::from_word(40);
        assert_eq!(sp.below(32).word(), 32);
        assert_eq!(sp.above(32).word(), 48);
        assert_eq!(StackPointer::from_word(2).below(32).word(), 0);
    }
}
