//! # Synchronization Primitives
//!
//! Interrupt-safe critical sections plus the two blocking primitives built
//! on the scheduler: a counting [`Semaphore`] and a priority-boosting
//! [`Mutex`]. All shared kernel state is accessed inside a critical section
//! so task code, SysTick and PendSV never race.

pub mod mutex;
pub mod semaphore;

pub use ::critical_section::CriticalSection;
pub use mutex::{Mutex, MutexCb};
pub use semaphore::{Semaphore, SemaphoreCb};

use crate::scheduler::Dispatch;

/// Execute a closure within a critical section (interrupts disabled).
///
/// Interrupts are disabled on entry and restored on exit. On target this is
/// `cortex-m`'s single-core implementation; host builds use the `std`
/// implementation of `critical-section`.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|cs| {
///     // Access shared state safely
/// });
/// ```
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    ::critical_section::with(f)
}

/// Result of a wait/acquire call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The caller obtained the resource and keeps running.
    Ready,
    /// The caller was blocked; the contained decision names its successor.
    Blocked(Dispatch),
}
