//! # Processor Context
//!
//! The saved-register image a task leaves on its own stack while it is not
//! running. The layout matches what the PendSV handler pushes and pops:
//!
//! ```text
//! high address
//!   xPSR            ┐
//!   PC              │
//!   LR              │ stacked by hardware on exception entry
//!   R12             │
//!   R3 .. R0        ┘
//!   R11 .. R4       ┐ stacked by PendSV (stmdb / ldmia)
//! low address       ┘  <- saved stack pointer
//! ```
//!
//! A task that has never run gets a synthesized frame in exactly this
//! shape, so its first dispatch goes through the same restore path as any
//! later one.

use core::mem::size_of;

/// xPSR with only the Thumb state bit set.
pub const INITIAL_XPSR: u32 = 0x0100_0000;

/// Entry point of a task. Receives the opaque argument given at
/// registration in R0 and never returns.
pub type TaskEntry = extern "C" fn(usize) -> !;

/// Saved register image, lowest address first.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// R4–R11, saved by software.
    pub r4_r11: [u32; 8],
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

impl Frame {
    /// Size of the frame in 32-bit words.
    pub const WORDS: usize = size_of::<Frame>() / 4;

    /// Copy this frame onto a descending stack whose current top is `sp`.
    /// Returns the new stack pointer, which addresses the frame.
    ///
    /// # Safety
    /// `sp` must be 4-byte aligned and the `WORDS` words below it must be
    /// writable memory owned by the caller.
    pub unsafe fn push(self, sp: *mut u32) -> *mut u32 {
        let base = sp.sub(Self::WORDS);
        core::ptr::write(base as *mut Frame, self);
        base
    }

    /// Read the frame at `sp` and return it with the stack pointer just
    /// above it.
    ///
    /// # Safety
    /// `sp` must address a frame previously written by [`Frame::push`] or
    /// by the context-switch handler.
    pub unsafe fn pop(sp: *mut u32) -> (Frame, *mut u32) {
        let frame = core::ptr::read(sp as *const Frame);
        (frame, sp.add(Self::WORDS))
    }
}

/// Build the frame a task must present on its first dispatch.
///
/// PC holds the entry address with the Thumb bit cleared (an exception
/// frame stores the exact program counter), R0 holds `arg`, xPSR selects
/// Thumb state. Every other register carries a sentinel (`0x0404_0404` for
/// R4, `0x1212_1212` for R12 and so on) so a fresh frame is easy to spot in
/// a memory dump.
pub fn synthesize_initial_frame(entry: TaskEntry, arg: usize) -> Frame {
    Frame {
        r4_r11: [
            0x0404_0404,
            0x0505_0505,
            0x0606_0606,
            0x0707_0707,
            0x0808_0808,
            0x0909_0909,
            0x1010_1010,
            0x1111_1111,
        ],
        r0: arg as u32,
        r1: 0x0101_0101,
        r2: 0x0202_0202,
        r3: 0x0303_0303,
        r12: 0x1212_1212,
        lr: 0x1414_1414,
        pc: entry as usize as u32 & !1,
        xpsr: INITIAL_XPSR,
    }
}
