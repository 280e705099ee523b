//! # Initial Register Frame
//!
//! A new thread starts by being "restored" like any preempted thread, so
//! its stack must already hold the frame the context switch pops.
//!
//! ## Stack Layout (top = high address, growing down)
//!
//! ```text
//! [Hardware frame]  popped by exception return
//!   xPSR  (Thumb bit set)
//!   PC    (entry point)
//!   LR    0xE
//!   R12   0xC
//!   R3 … R0
//! [Software frame]  popped by PendSV before returning
//!   R11 … R4        <- saved stack pointer after build
//! ```
//!
//! The order inside each group is fixed by the exception-return sequence
//! and the PendSV `ldmia` and must not be permuted.

use crate::arena::{StackArena, StackPointer, StackRegion, WORD_SIZE};
use crate::thread::ThreadEntry;

/// Registers PendSV saves and restores itself (`r4`–`r11`).
pub const SOFTWARE_FRAME_WORDS: usize = 8;

/// Registers the core stacks on exception entry.
pub const HARDWARE_FRAME_WORDS: usize = 8;

pub const FRAME_WORDS: usize = SOFTWARE_FRAME_WORDS + HARDWARE_FRAME_WORDS;

/// Bytes PendSV pushes below the live PSP before saving it.
pub const SOFTWARE_FRAME_BYTES: usize = SOFTWARE_FRAME_WORDS * WORD_SIZE;

/// xPSR with only the Thumb execution-state bit set. Restoring a frame
/// without it faults immediately.
pub const XPSR_THUMB: u32 = 0x0100_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareFrame {
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareFrame {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

/// The full frame as it lies on a fresh thread stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialFrame {
    pub software: SoftwareFrame,
    pub hardware: HardwareFrame,
}

impl InitialFrame {
    /// Frame that resumes at `entry`. General-purpose registers hold their
    /// own register number so a completed restore is recognizable.
    pub fn new(entry: ThreadEntry) -> Self {
        Self {
            software: SoftwareFrame {
                r4: 0x4,
                r5: 0x5,
                r6: 0x6,
                r7: 0x7,
                r8: 0x8,
                r9: 0x9,
                r10: 0xA,
                r11: 0xB,
            },
            hardware: HardwareFrame {
                r0: 0x0,
                r1: 0x1,
                r2: 0x2,
                r3: 0x3,
                r12: 0xC,
                lr: 0xE,
                pc: entry_address(entry),
                xpsr: XPSR_THUMB,
            },
        }
    }

    /// Words in stack order, lowest address first.
    pub fn to_words(&self) -> [u32; FRAME_WORDS] {
        let s = &self.software;
        let h = &self.hardware;
        [
            s.r4, s.r5, s.r6, s.r7, s.r8, s.r9, s.r10, s.r11, //
            h.r0, h.r1, h.r2, h.r3, h.r12, h.lr, h.pc, h.xpsr,
        ]
    }

    pub fn from_words(w: &[u32; FRAME_WORDS]) -> Self {
        Self {
            software: SoftwareFrame {
                r4: w[0],
                r5: w[1],
                r6: w[2],
                r7: w[3],
                r8: w[4],
                r9: w[5],
                r10: w[6],
                r11: w[7],
            },
            hardware: HardwareFrame {
                r0: w[8],
                r1: w[9],
                r2: w[10],
                r3: w[11],
                r12: w[12],
                lr: w[13],
                pc: w[14],
                xpsr: w[15],
            },
        }
    }
}

/// Program counter value for a thread entry. The Thumb interworking bit
/// of the function address is cleared; execution state comes from xPSR.
pub fn entry_address(entry: ThreadEntry) -> u32 {
    (entry as usize as u32) & !1
}

/// Write the initial frame at the top of `region`.
///
/// Returns the saved stack pointer, or `None` if the region cannot hold
/// a frame.
pub fn build(arena: &mut StackArena, region: StackRegion, entry: ThreadEntry) -> Option<StackPointer> {
    let words = arena.region_mut(region);
    let start = words.len().checked_sub(FRAME_WORDS)?;
    words[start..].copy_from_slice(&InitialFrame::new(entry).to_words());
    Some(StackPointer::from_word(region.bottom().word() + start))
}

/// Read back the frame a saved stack pointer refers to.
pub fn read(arena: &StackArena, sp: StackPointer) -> Option<InitialFrame> {
    let words: &[u32; FRAME_WORDS] = arena.words(sp, FRAME_WORDS)?.try_into().ok()?;
    Some(InitialFrame::from_words(words))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::THREAD_STACK_SIZE;

    extern "C" fn body() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn frame_resumes_at_entry_in_thumb_state() {
        let mut arena = StackArena::new();
        let region = arena.allocate(THREAD_STACK_SIZE).unwrap();
        let sp = build(&mut arena, region, body).unwrap();

        assert_eq!(sp.word(), region.top().word() - FRAME_WORDS);
        let frame = read(&arena, sp).unwrap();
        assert_eq!(frame.hardware.pc, entry_address(body));
        assert_eq!(frame.hardware.xpsr & XPSR_THUMB, XPSR_THUMB);
    }

    #[test]
    fn software_group_sits_below_hardware_group() {
        let mut arena = StackArena::new();
        let region = arena.allocate(THREAD_STACK_SIZE).unwrap();
        let sp = build(&mut arena, region, body).unwrap();

        let words = arena.words(sp, FRAME_WORDS).unwrap();
        assert_eq!(&words[..8], &[0x4, 0x5, 0x6, 0x7, 0x8, 0x9, 0xA, 0xB]);
        assert_eq!(&words[8..13], &[0x0, 0x1, 0x2, 0x3, 0xC]);
        assert_eq!(words[13], 0xE);
        assert_eq!(words[14], entry_address(body));
        assert_eq!(words[15], XPSR_THUMB);
    }

    #[test]
    fn restore_path_lands_on_hardware_frame() {
        let mut arena = StackArena::new();
        let region = arena.allocate(THREAD_STACK_SIZE).unwrap();
        let sp = build(&mut arena, region, body).unwrap();

        // PendSV pops the software group, exception return the rest.
        let psp = sp.above(SOFTWARE_FRAME_BYTES);
        let hw = arena.words(psp, HARDWARE_FRAME_WORDS).unwrap();
        assert_eq!(hw[6], entry_address(body));
        assert_eq!(psp.above(HARDWARE_FRAME_WORDS * WORD_SIZE), region.top());
    }

    #[test]
    fn region_too_small_for_a_frame_is_rejected() {
        let mut arena = StackArena::new();
        let region = arena.allocate((FRAME_WORDS - 1) * WORD_SIZE).unwrap();
        assert_eq!(build(&mut arena, region, body), None);
    }

    #[test]
    fn interworking_bit_is_cleared() {
        assert_eq!(entry_address(body) & 1, 0);
    }
}
