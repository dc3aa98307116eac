//! Host port.
//!
//! There are no exceptions to pend on a hosted target; a requested context
//! switch is only recorded so a test harness can carry it out through
//! [`crate::kernel::on_context_switch`].

use core::sync::atomic::{AtomicBool, Ordering};

static SWITCH_PENDED: AtomicBool = AtomicBool::new(false);

pub fn pend_context_switch() {
    SWITCH_PENDED.store(true, Ordering::SeqCst);
}

/// Whether a switch was pended since the last call. Clears the flag.
pub fn take_pended_switch() -> bool {
    SWITCH_PENDED.swap(false, Ordering::SeqCst)
}

pub fn wait_for_interrupt() {
    core::hint::spin_loop();
}
