//! # Ready Queues
//!
//! One FIFO of task ids per priority level plus a bitmap with one bit per
//! level. Bit `p` is set iff the queue of level `p` is non-empty; both are
//! always updated together, so finding the most urgent ready task is a
//! single count-leading-zeros.

use core::fmt;

use heapless::Deque;

use crate::config::MAX_TASKS;
use crate::error::KernelError;
use crate::task::{Priority, QueueLink, TaskControlBlock, TaskId, TaskState, PRIORITY_LEVELS};

// ---------------------------------------------------------------------------
// Task FIFO
// ---------------------------------------------------------------------------

/// A FIFO of task ids. Used for ready queues and for the wait queues of
/// semaphores and mutexes.
///
/// A task is in at most one queue at a time, so a capacity of `MAX_TASKS`
/// can never overflow.
pub struct TaskQueue {
    ids: Deque<TaskId, MAX_TASKS>,
}

impl TaskQueue {
    pub const fn new() -> Self {
        Self { ids: Deque::new() }
    }

    /// Append `task` and mark it as linked with `link`.
    pub fn push_back(
        &mut self,
        task: &mut TaskControlBlock,
        link: QueueLink,
    ) -> Result<(), KernelError> {
        debug_assert!(task.queue.is_none(), "task {} is already queued", task.id);
        self.ids
            .push_back(task.id)
            .map_err(|_| KernelError::CapacityExceeded)?;
        task.queue = Some(link);
        Ok(())
    }

    /// Remove the head. The caller clears the TCB's link.
    pub fn pop_front(&mut self) -> Option<TaskId> {
        self.ids.pop_front()
    }

    pub fn front(&self) -> Option<TaskId> {
        self.ids.front().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.ids.iter().any(|&x| x == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.ids.iter().copied()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Priority bitmap
// ---------------------------------------------------------------------------

/// One bit per priority level.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityBitmap {
    bits: u8,
}

impl PriorityBitmap {
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    #[inline]
    pub fn get(&self, level: usize) -> bool {
        assert!(level < PRIORITY_LEVELS);
        self.bits & (1 << level) != 0
    }

    #[inline]
    pub fn set(&mut self, level: usize) {
        assert!(level < PRIORITY_LEVELS);
        self.bits |= 1 << level;
    }

    #[inline]
    pub fn clear(&mut self, level: usize) {
        assert!(level < PRIORITY_LEVELS);
        self.bits &= !(1 << level);
    }

    /// Position of the highest set bit.
    #[inline]
    pub fn highest(&self) -> Option<usize> {
        if self.bits == 0 {
            None
        } else {
            Some((u8::BITS - 1 - self.bits.leading_zeros()) as usize)
        }
    }
}

impl fmt::Debug for PriorityBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05b}", self.bits)
    }
}

// ---------------------------------------------------------------------------
// Ready-queue set
// ---------------------------------------------------------------------------

/// The ready queues of all priority levels.
#[derive(Debug)]
pub struct ReadyQueues {
    queues: [TaskQueue; PRIORITY_LEVELS],
    bitmap: PriorityBitmap,
}

impl ReadyQueues {
    pub const fn new() -> Self {
        const EMPTY: TaskQueue = TaskQueue::new();
        Self {
            queues: [EMPTY; PRIORITY_LEVELS],
            bitmap: PriorityBitmap::new(),
        }
    }

    /// Append `task` to the queue of its current priority and mark it Ready.
    pub fn enqueue(&mut self, task: &mut TaskControlBlock) -> Result<(), KernelError> {
        let level = task.priority.level();
        self.queues[level].push_back(task, QueueLink::Ready(task.priority))?;
        task.state = TaskState::Ready;
        self.bitmap.set(level);
        Ok(())
    }

    /// Remove the head of the queue at `level`. The caller unlinks the TCB.
    pub fn dequeue(&mut self, level: Priority) -> Result<TaskId, KernelError> {
        let queue = &mut self.queues[level.level()];
        let id = queue.pop_front().ok_or(KernelError::EmptyQueue)?;
        if queue.is_empty() {
            self.bitmap.clear(level.level());
        }
        Ok(id)
    }

    /// The head of the queue at `level`, without removing it.
    pub fn peek(&self, level: Priority) -> Option<TaskId> {
        self.queues[level.level()].front()
    }

    /// The most urgent occupied level.
    #[inline]
    pub fn highest_level(&self) -> Option<Priority> {
        self.bitmap.highest().and_then(Priority::from_level)
    }

    pub fn queue(&self, level: Priority) -> &TaskQueue {
        &self.queues[level.level()]
    }

    pub fn bitmap(&self) -> PriorityBitmap {
        self.bitmap
    }

    /// Whether every bitmap bit agrees with the occupancy of its queue.
    pub fn is_consistent(&self) -> bool {
        self.queues
            .iter()
            .enumerate()
            .all(|(level, q)| self.bitmap.get(level) == !q.is_empty())
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
