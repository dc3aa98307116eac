//! Counting semaphore.
//!
//! A negative count `-n` means `n` tasks are blocked in the wait queue.
//! `wait` consumes a permit up front, so a task woken by `signal` resumes
//! already holding its permit and never re-checks the count.

use core::cell::RefCell;

use ::critical_section::Mutex as CsMutex;
use log::trace;

use super::{critical_section, Acquire};
use crate::error::KernelError;
use crate::kernel;
use crate::readyqueue::TaskQueue;
use crate::scheduler::Scheduler;
use crate::task::TaskId;

/// *Semaphore control block* - the state of a semaphore.
#[derive(Debug)]
pub struct SemaphoreCb {
    count: i32,
    wait_queue: TaskQueue,
}

impl SemaphoreCb {
    pub const fn new(count: i32) -> Self {
        Self {
            count,
            wait_queue: TaskQueue::new(),
        }
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn wait_queue(&self) -> &TaskQueue {
        &self.wait_queue
    }

    /// Take a permit on behalf of the running task, blocking it if none is
    /// available.
    pub fn wait(&mut self, sched: &mut Scheduler) -> Result<Acquire, KernelError> {
        let caller = sched.running_task()?;
        let count = self.count.checked_sub(1).ok_or(KernelError::Underflow)?;
        self.count = count;

        if count >= 0 {
            return Ok(Acquire::Ready);
        }
        trace!("task {} waits on semaphore, count {}", caller, count);
        let dispatch = sched.block_current(&mut self.wait_queue)?;
        Ok(Acquire::Blocked(dispatch))
    }

    /// Return a permit. If tasks are waiting, the longest waiter receives
    /// it and becomes Ready; its id is returned.
    pub fn signal(&mut self, sched: &mut Scheduler) -> Result<Option<TaskId>, KernelError> {
        let count = self.count.checked_add(1).ok_or(KernelError::Overflow)?;
        let woken = if self.count < 0 {
            sched.wake_one(&mut self.wait_queue)?
        } else {
            None
        };
        self.count = count;
        Ok(woken)
    }
}

/// A counting semaphore that can be placed in a `static`.
///
/// ```ignore
/// static DATA_READY: Semaphore = Semaphore::new(0);
///
/// // producer
/// DATA_READY.signal()?;
/// // consumer
/// DATA_READY.wait()?;
/// ```
pub struct Semaphore {
    cb: CsMutex<RefCell<SemaphoreCb>>,
}

impl Semaphore {
    pub const fn new(count: i32) -> Self {
        Self {
            cb: CsMutex::new(RefCell::new(SemaphoreCb::new(count))),
        }
    }

    /// Take a permit, suspending the calling task until one is available.
    pub fn wait(&self) -> Result<(), KernelError> {
        critical_section(|cs| {
            let mut sched = kernel::scheduler(cs);
            if let Acquire::Blocked(dispatch) = self.cb.borrow_ref_mut(cs).wait(&mut sched)? {
                kernel::request_switch(dispatch);
            }
            Ok(())
        })
    }

    /// Return a permit. A woken task that outranks the caller preempts it
    /// immediately; otherwise it runs at a later tick.
    pub fn signal(&self) -> Result<(), KernelError> {
        critical_section(|cs| {
            let mut sched = kernel::scheduler(cs);
            if self.cb.borrow_ref_mut(cs).signal(&mut sched)?.is_some() {
                kernel::request_switch(sched.preempt_if_higher()?);
            }
            Ok(())
        })
    }

    pub fn count(&self) -> i32 {
        critical_section(|cs| self.cb.borrow_ref(cs).count())
    }
}
