//! # Service Calls
//!
//! Threads reach the kernel through `SVC #imm8`. The call number lives in
//! the instruction itself, so the handler reads the halfword preceding the
//! stacked return address and hands it to [`decode`]. Nothing else in the
//! kernel looks at raw call-frame bytes.

/// Kernel service reachable from thread mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    /// Give up the core; the scheduler picks the next thread.
    Yield,
}

impl Syscall {
    /// The `imm8` operand of the `SVC` instruction.
    pub const fn number(self) -> u8 {
        match self {
            Syscall::Yield => 0,
        }
    }

    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(Syscall::Yield),
            _ => None,
        }
    }
}

/// Thumb encoding of `SVC #imm8`: `1101 1111 iiii iiii`.
const SVC_OPCODE: u16 = 0xDF00;
const SVC_OPCODE_MASK: u16 = 0xFF00;

/// Decode the trapping instruction. `None` for anything that is not an
/// `SVC` or carries an unknown call number.
pub fn decode(instruction: u16) -> Option<Syscall> {
    if instruction & SVC_OPCODE_MASK != SVC_OPCODE {
        return None;
    }
    Syscall::from_number((instruction & !SVC_OPCODE_MASK) as u8)
}
