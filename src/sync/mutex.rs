//! Priority-boosting mutex.
//!
//! While a task owns the mutex its effective priority is raised to
//! [`Priority::CEILING`](crate::task::Priority::CEILING), so no task that might also need the lock can
//! preempt the owner and leave a more urgent waiter stuck behind it. This is
//! a ceiling policy: the owner is boosted to the top level unconditionally,
//! not to the level of its most urgent waiter as classical priority
//! inheritance would do.
//!
//! A task may own several mutexes at once, released in any order. It stays
//! at the ceiling until it has released the last one and then returns to
//! its base priority.
//!
//! On release the lock is handed straight to the longest waiter, which
//! therefore resumes as the owner without contending again.

use core::cell::RefCell;

use ::critical_section::Mutex as CsMutex;
use log::{trace, warn};

use super::{critical_section, Acquire};
use crate::error::KernelError;
use crate::kernel;
use crate::readyqueue::TaskQueue;
use crate::scheduler::Scheduler;
use crate::task::TaskId;

/// *Mutex control block* - the state of a mutex.
#[derive(Debug)]
pub struct MutexCb {
    /// The owning task; `None` while unlocked.
    owner: Option<TaskId>,

    wait_queue: TaskQueue,
}

impl MutexCb {
    pub const fn new() -> Self {
        Self {
            owner: None,
            wait_queue: TaskQueue::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.owner.is_some()
    }

    pub fn owner(&self) -> Option<TaskId> {
        self.owner
    }

    pub fn wait_queue(&self) -> &TaskQueue {
        &self.wait_queue
    }

    /// Lock on behalf of the running task, blocking it while another task
    /// owns the mutex.
    pub fn acquire(&mut self, sched: &mut Scheduler) -> Result<Acquire, KernelError> {
        let caller = sched.running_task()?;
        match self.owner {
            None => {
                self.take(sched, caller)?;
                Ok(Acquire::Ready)
            }
            Some(owner) if owner == caller => Err(KernelError::WouldDeadlock),
            Some(owner) => {
                trace!("task {} waits on mutex owned by task {}", caller, owner);
                let dispatch = sched.block_current(&mut self.wait_queue)?;
                Ok(Acquire::Blocked(dispatch))
            }
        }
    }

    /// Unlock on behalf of the running task and drop its boost. If tasks
    /// are waiting, ownership passes to the longest waiter, which becomes
    /// Ready; its id is returned.
    pub fn release(&mut self, sched: &mut Scheduler) -> Result<Option<TaskId>, KernelError> {
        let caller = sched.running_task()?;
        if self.owner != Some(caller) {
            warn!("task {} released a mutex owned by {:?}", caller, self.owner);
            return Err(KernelError::NotOwner);
        }

        sched.release_lock(caller)?;
        self.owner = None;

        match sched.pop_waiter(&mut self.wait_queue) {
            Some(next) => {
                self.take(sched, next)?;
                sched.make_ready(next)?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    fn take(&mut self, sched: &mut Scheduler, id: TaskId) -> Result<(), KernelError> {
        sched.hold_lock(id)?;
        self.owner = Some(id);
        trace!("task {} owns mutex", id);
        Ok(())
    }
}

impl Default for MutexCb {
    fn default() -> Self {
        Self::new()
    }
}

/// A priority-boosting mutex that can be placed in a `static`.
///
/// ```ignore
/// static BUS: Mutex = Mutex::new();
///
/// BUS.acquire()?;
/// // exclusive access, running at the ceiling priority
/// BUS.release()?;
/// ```
pub struct Mutex {
    cb: CsMutex<RefCell<MutexCb>>,
}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            cb: CsMutex::new(RefCell::new(MutexCb::new())),
        }
    }

    /// Lock the mutex, suspending the calling task until it is the owner.
    pub fn acquire(&self) -> Result<(), KernelError> {
        critical_section(|cs| {
            let mut sched = kernel::scheduler(cs);
            if let Acquire::Blocked(dispatch) = self.cb.borrow_ref_mut(cs).acquire(&mut sched)? {
                kernel::request_switch(dispatch);
            }
            Ok(())
        })
    }

    /// Unlock the mutex. Fails with [`KernelError::NotOwner`], changing
    /// nothing, if the caller does not own it.
    pub fn release(&self) -> Result<(), KernelError> {
        critical_section(|cs| {
            let mut sched = kernel::scheduler(cs);
            self.cb.borrow_ref_mut(cs).release(&mut sched)?;
            // The caller may have dropped below a waiting or woken task
            kernel::request_switch(sched.preempt_if_higher()?);
            Ok(())
        })
    }

    pub fn owner(&self) -> Option<TaskId> {
        critical_section(|cs| self.cb.borrow_ref(cs).owner())
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
