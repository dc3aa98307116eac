//! # Task Control Block
//!
//! Defines the task model: the state machine, the priority levels, the TCB
//! itself and the static arena the task stacks are carved from.

use crate::config::{MAX_TASKS, STACK_SIZE, STACK_WORDS};

/// Stable index of a task in the scheduler's TCB array.
pub type TaskId = usize;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task.
///
/// ```text
///                 activate()           tick / wake-up
///   ┌──────────┐ ──────────► ┌───────┐ ─────────────► ┌─────────┐
///   │ Inactive │             │ Ready │                │ Running │
///   └──────────┘             └───────┘ ◄───────────── └─────────┘
///                              ▲        preempt / yield   │    │
///                     signal / │                   wait / │    │ exit
///                     release  │                  acquire ▼    ▼
///                            ┌─────────┐          ┌────────────┐
///                            │ Blocked │          │ Terminated │
///                            └─────────┘          └────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered but not yet admitted to a ready queue.
    Inactive,
    /// Waiting in the ready queue of its priority level.
    Ready,
    /// Currently executing on the CPU.
    Running,
    /// Waiting in a semaphore or mutex wait queue.
    Blocked,
    /// Finished; never scheduled again. The slot is not reclaimed.
    Terminated,
}

// ---------------------------------------------------------------------------
// Priority levels
// ---------------------------------------------------------------------------

/// Scheduling priority. Ordered from `Idle` (lowest) to `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Idle = 0,
    Low = 1,
    Normal = 2,
    AboveNormal = 3,
    High = 4,
}

/// Number of distinct priority levels.
pub const PRIORITY_LEVELS: usize = 5;

impl Priority {
    /// All levels, lowest first.
    pub const ALL: [Priority; PRIORITY_LEVELS] = [
        Priority::Idle,
        Priority::Low,
        Priority::Normal,
        Priority::AboveNormal,
        Priority::High,
    ];

    /// The level a mutex owner is boosted to.
    pub const CEILING: Priority = Priority::High;

    /// Index of this level in the ready-queue array.
    #[inline]
    pub const fn level(self) -> usize {
        self as usize
    }

    pub const fn from_level(level: usize) -> Option<Priority> {
        if level < PRIORITY_LEVELS {
            Some(Self::ALL[level])
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Queue membership
// ---------------------------------------------------------------------------

/// Which queue, if any, currently holds a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLink {
    /// Ready queue of the given level.
    Ready(Priority),
    /// Wait queue of a semaphore or mutex.
    Wait,
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Task Control Block (TCB).
///
/// TCBs are stored in a fixed array inside the scheduler. The stack itself
/// lives in the [`StackArena`]; the TCB only remembers where it is.
#[derive(Debug, Clone, Copy)]
pub struct TaskControlBlock {
    /// Index in the scheduler's task array.
    pub id: TaskId,

    pub state: TaskState,

    /// Effective priority. Differs from `base_priority` while a mutex boost
    /// is in effect.
    pub priority: Priority,

    /// Priority given at registration.
    pub base_priority: Priority,

    /// Saved stack pointer (PSP). Meaningless while the task is Running.
    pub stack_pointer: *mut u32,

    /// Highest address (exclusive) of the task's stack region.
    pub stack_top: usize,

    /// The queue this task is linked into.
    pub queue: Option<QueueLink>,

    /// Ticks that fired while this task was current.
    pub run_ticks: u32,

    /// Number of mutexes this task owns. The task stays at the ceiling
    /// priority while this is non-zero.
    pub locks_held: u8,

    /// Whether this slot holds a registered task.
    pub active: bool,
}

// Safety: `stack_pointer` always points into the task's own region of the
// stack arena. TCBs are only accessed inside critical sections.
unsafe impl Send for TaskControlBlock {}

impl TaskControlBlock {
    /// An unallocated slot.
    pub const EMPTY: Self = Self {
        id: 0,
        state: TaskState::Inactive,
        priority: Priority::Idle,
        base_priority: Priority::Idle,
        stack_pointer: core::ptr::null_mut(),
        stack_top: 0,
        queue: None,
        run_ticks: 0,
        locks_held: 0,
        active: false,
    };

    /// Initialize the slot for a newly registered task. The stack frame is
    /// written separately by the scheduler.
    pub fn init(&mut self, id: TaskId, priority: Priority, stack_top: usize) {
        *self = Self::EMPTY;
        self.id = id;
        self.priority = priority;
        self.base_priority = priority;
        self.stack_top = stack_top;
        self.active = true;
    }

    /// Lowest address of the task's stack region.
    #[inline]
    pub fn stack_bottom(&self) -> usize {
        self.stack_top - STACK_SIZE
    }

    /// Whether the task still takes part in scheduling.
    #[inline]
    pub fn is_schedulable(&self) -> bool {
        self.active && !matches!(self.state, TaskState::Blocked | TaskState::Terminated)
    }

    /// Whether the effective priority is raised above the base priority.
    #[inline]
    pub fn is_boosted(&self) -> bool {
        self.priority > self.base_priority
    }
}

// ---------------------------------------------------------------------------
// Stack arena
// ---------------------------------------------------------------------------

/// Backing memory for all task stacks. Task `i` owns the `i`-th
/// `STACK_SIZE` block counted downward from [`StackArena::base`].
#[repr(C, align(8))]
pub struct StackArena {
    words: [[u32; STACK_WORDS]; MAX_TASKS],
}

impl StackArena {
    pub const fn new() -> Self {
        Self {
            words: [[0; STACK_WORDS]; MAX_TASKS],
        }
    }

    /// Shared base address: one past the highest word of the arena.
    pub fn base(&mut self) -> usize {
        self.words.as_mut_ptr() as usize + MAX_TASKS * STACK_SIZE
    }
}

impl Default for StackArena {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcb_initialization() {
        let mut tcb = TaskControlBlock::EMPTY;
        assert!(!tcb.active);
        assert_eq!(tcb.state, TaskState::Inactive);

        tcb.init(3, Priority::Normal, 0x2000_1000);

        assert!(tcb.active);
        assert_eq!(tcb.id, 3);
        assert_eq!(tcb.state, TaskState::Inactive);
        assert_eq!(tcb.priority, Priority::Normal);
        assert_eq!(tcb.base_priority, Priority::Normal);
        assert_eq!(tcb.stack_bottom(), 0x2000_1000 - STACK_SIZE);
        assert_eq!(tcb.queue, None);
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::Idle < Priority::Low);
        assert!(Priority::AboveNormal < Priority::High);
        assert_eq!(Priority::CEILING, Priority::High);
        for (i, p) in Priority::ALL.iter().enumerate() {
            assert_eq!(p.level(), i);
            assert_eq!(Priority::from_level(i), Some(*p));
        }
        assert_eq!(Priority::from_level(PRIORITY_LEVELS), None);
    }

    #[test]
    fn test_schedulable() {
        let mut tcb = TaskControlBlock::EMPTY;
        tcb.init(0, Priority::Low, 0x1000_8000);
        tcb.state = TaskState::Running;
        assert!(tcb.is_schedulable());
        tcb.state = TaskState::Blocked;
        assert!(!tcb.is_schedulable());
        tcb.state = TaskState::Terminated;
        assert!(!tcb.is_schedulable());
    }

    #[test]
    fn test_boost_detection() {
        let mut tcb = TaskControlBlock::EMPTY;
        tcb.init(1, Priority::Low, 0x1000_8000);
        assert!(!tcb.is_boosted());
        tcb.priority = Priority::CEILING;
        assert!(tcb.is_boosted());
    }

    #[test]
    fn test_arena_base_alignment() {
        let mut arena = std::boxed::Box::new(StackArena::new());
        let base = arena.base();
        assert_eq!(base % 8, 0);
        assert_eq!(base - arena.words.as_ptr() as usize, MAX_TASKS * STACK_SIZE);
    }
}
