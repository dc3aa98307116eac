//! # Armv7-M Port
//!
//! Port for the Cortex-M3 and Cortex-M4 (Thumb-2). Provides the SysTick
//! tick source, the PendSV context switch and the first dispatch.
//!
//! ## Context Switch Mechanism
//!
//! Tasks run in Thread mode on the process stack (PSP); the kernel and all
//! exception handlers use the main stack (MSP).
//!
//! On exception entry the hardware stacks R0–R3, R12, LR, PC and xPSR onto
//! the PSP. PendSV pushes R4–R11 below them, hands the resulting pointer to
//! the kernel and restores R4–R11 of whichever task the kernel returns,
//! which completes the full save/restore.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: `SYSTICK_PRIORITY` (0x80). The scheduling decision.
//! - PendSV: `PENDSV_PRIORITY` (0xFF, lowest). The switch itself, which
//!   therefore never runs in the middle of another handler.

use core::arch::{asm, global_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use crate::config::{PENDSV_PRIORITY, SYSTICK_PRIORITY};
use crate::kernel;

// ---------------------------------------------------------------------------
// SysTick
// ---------------------------------------------------------------------------

/// Program SysTick to interrupt every `reload + 1` core clock cycles.
pub fn configure_systick(syst: &mut SYST, reload: u32) {
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Give SysTick a more urgent priority than PendSV, so a tick's decision is
/// always complete before the switch it requested runs.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // Safety: only the two kernel exceptions are reprioritized, before any
    // task runs.
    unsafe {
        scb.set_priority(SystemHandler::SysTick, SYSTICK_PRIORITY);
        scb.set_priority(SystemHandler::PendSV, PENDSV_PRIORITY);
    }
}

#[no_mangle]
extern "C" fn SysTick() {
    kernel::on_tick();
}

// ---------------------------------------------------------------------------
// PendSV
// ---------------------------------------------------------------------------

/// Request a context switch. PendSV runs once no other handler is active.
#[inline]
pub fn pend_context_switch() {
    SCB::set_pendsv();
}

// PendSV handler. Returns to Thread mode on the PSP (EXC_RETURN
// 0xFFFF_FFFD, built with `mvn lr, #2`). MSP is 8-byte aligned on
// exception entry, so the call needs no padding.
global_asm!(
    ".section .text.PendSV,\"ax\",%progbits",
    ".global PendSV",
    ".type PendSV,%function",
    ".thumb_func",
    "PendSV:",
    "    mrs r0, psp",
    "    stmdb r0!, {{r4-r11}}",
    "    bl fprtos_switch_context",
    "    ldmia r0!, {{r4-r11}}",
    "    msr psp, r0",
    "    mvn lr, #2",
    "    bx lr",
    ".size PendSV, . - PendSV",
);

#[no_mangle]
extern "C" fn fprtos_switch_context(outgoing_sp: *mut u32) -> *mut u32 {
    kernel::on_context_switch(outgoing_sp)
}

// ---------------------------------------------------------------------------
// First dispatch
// ---------------------------------------------------------------------------

/// Switch Thread mode to the PSP and enter the task whose synthesized
/// frame starts at `sp`. Enables interrupts on the way.
///
/// # Safety
/// Must be called once, from Thread mode with interrupts disabled, with
/// `sp` pointing at a frame built by `synthesize_initial_frame`.
pub unsafe fn start_first_task(sp: *mut u32) -> ! {
    asm!(
        // Skip R4-R11, which hold only sentinels
        "adds r0, #32",
        "msr psp, r0",
        "movs r0, #2",
        "msr control, r0",
        "isb",
        // Unwind the hardware part of the frame from the PSP by hand
        "pop {{r0-r3, r12}}",
        "pop {{r4, r5, r6}}",
        "mov lr, r4",
        "orr r5, r5, #1",
        "cpsie i",
        "bx r5",
        in("r0") sp,
        options(noreturn)
    );
}

/// Sleep until the next interrupt.
#[inline]
pub fn wait_for_interrupt() {
    cortex_m::asm::wfi();
}
