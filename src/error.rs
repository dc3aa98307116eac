//! # Kernel Errors
//!
//! Every fallible kernel operation reports a [`KernelError`]. Blocking on a
//! semaphore or mutex is ordinary control flow and never an error.

use core::fmt;

/// Error returned by kernel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// All task slots are in use.
    CapacityExceeded,
    /// A dequeue was attempted on an empty ready queue. The priority bitmap
    /// and the queues disagree.
    EmptyQueue,
    /// A mutex was released by a task that does not own it.
    NotOwner,
    /// No priority level is occupied at a scheduling decision. The idle task
    /// must always be runnable, so this is an invariant violation.
    NoReadyTask,
    /// The semaphore count would drop below `i32::MIN`.
    Underflow,
    /// The semaphore count would exceed `i32::MAX`.
    Overflow,
    /// The stack arena's base address is null or not 8-byte aligned.
    InvalidStackBase,
    /// `start` was called without a task registered at `Priority::Idle`.
    NoIdleTask,
    /// The calling task already owns the mutex.
    WouldDeadlock,
    /// The operation is not valid in the current context, e.g. waiting
    /// before the scheduler runs or registering after it started.
    BadContext,
    /// The task id does not name a registered task in the expected state.
    BadId,
    /// The idle task attempted to exit.
    IdleTaskExit,
}

impl KernelError {
    /// Fatal errors mean a kernel invariant is broken; the system halts.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded
                | Self::EmptyQueue
                | Self::NoReadyTask
                | Self::InvalidStackBase
                | Self::NoIdleTask
        )
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::CapacityExceeded => "task table is full",
            Self::EmptyQueue => "dequeue from an empty ready queue",
            Self::NotOwner => "mutex released by a task that does not own it",
            Self::NoReadyTask => "no task is ready to run",
            Self::Underflow => "semaphore count underflow",
            Self::Overflow => "semaphore count overflow",
            Self::InvalidStackBase => "stack base is null or misaligned",
            Self::NoIdleTask => "no idle task registered",
            Self::WouldDeadlock => "mutex is already owned by the caller",
            Self::BadContext => "operation not permitted in this context",
            Self::BadId => "no such task",
            Self::IdleTaskExit => "the idle task cannot exit",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(KernelError::EmptyQueue.is_fatal());
        assert!(KernelError::NoReadyTask.is_fatal());
        assert!(KernelError::CapacityExceeded.is_fatal());
        assert!(!KernelError::NotOwner.is_fatal());
        assert!(!KernelError::Overflow.is_fatal());
    }

    #[test]
    fn test_display() {
        assert_eq!(KernelError::NotOwner.to_string(), "mutex released by a task that does not own it");
    }
}
