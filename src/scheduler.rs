//! # Scheduler
//!
//! Core scheduling logic: the task registry, the fixed-priority ready-queue
//! selection made on every tick, and the bookkeeping half of the context
//! switch. Everything here is plain data manipulation; the architecture
//! port supplies the timer interrupt and the register save/restore.
//!
//! ## Scheduling Algorithm
//!
//! At each SysTick interrupt:
//! 1. **Count**: advance the tick counter, charge the tick to the current task
//! 2. **Requeue**: a still-running current task goes to the back of its
//!    level's FIFO
//! 3. **Select**: take the head of the highest occupied level
//! 4. **Switch**: if that is another task, remember it as the switch target
//!    and let the port pend PendSV
//!
//! Equal-priority tasks are thus round-robined at tick boundaries; a more
//! urgent level always wins.

use log::{debug, trace};

use crate::config::{MAX_TASKS, STACK_SIZE};
use crate::error::KernelError;
use crate::frame::{synthesize_initial_frame, TaskEntry};
use crate::readyqueue::{ReadyQueues, TaskQueue};
use crate::task::{Priority, QueueLink, TaskControlBlock, TaskId, TaskState};

/// Outcome of a scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The current task keeps the CPU.
    Keep,
    /// A context switch to the given task must be performed.
    SwitchTo(TaskId),
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The central scheduler state. A single instance lives in `kernel.rs`
/// behind a critical-section mutex.
pub struct Scheduler {
    /// Fixed-size array of TCBs, indexed by [`TaskId`].
    tasks: [TaskControlBlock; MAX_TASKS],

    ready: ReadyQueues,

    /// The task whose registers are live on the CPU.
    current: Option<TaskId>,

    /// Switch target chosen by a scheduling decision, consumed by
    /// [`Scheduler::switch_context`].
    next: Option<TaskId>,

    /// Number of registered tasks.
    task_count: usize,

    /// One past the highest address of the stack arena. Zero until
    /// [`Scheduler::initialize`] succeeds.
    stack_base: usize,

    /// Monotonic tick counter.
    tick_count: u64,

    /// Number of context switches carried out.
    switch_count: u32,

    started: bool,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            tasks: [TaskControlBlock::EMPTY; MAX_TASKS],
            ready: ReadyQueues::new(),
            current: None,
            next: None,
            task_count: 0,
            stack_base: 0,
            tick_count: 0,
            switch_count: 0,
            started: false,
        }
    }

    /// Reset all state and adopt the stack arena ending at `stack_base`.
    /// Fails with [`KernelError::BadContext`] once scheduling has started.
    ///
    /// `stack_base` must be the upper end of `MAX_TASKS * STACK_SIZE` bytes
    /// of memory reserved for task stacks.
    pub fn initialize(&mut self, stack_base: usize) -> Result<(), KernelError> {
        if self.started {
            return Err(KernelError::BadContext);
        }
        if stack_base == 0 || stack_base % 8 != 0 || stack_base < MAX_TASKS * STACK_SIZE {
            return Err(KernelError::InvalidStackBase);
        }
        *self = Self::new();
        self.stack_base = stack_base;
        debug!("kernel initialized, stack base {:#x}", stack_base);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Task registry
    // -----------------------------------------------------------------------

    /// Register a new task.
    ///
    /// The task gets the next free slot and the stack region below those of
    /// the previously registered tasks. Its initial frame is written at the
    /// top of that region, so the first dispatch restores `entry` with `arg`
    /// in R0. The task stays Inactive until [`Scheduler::activate`] or
    /// [`Scheduler::start`] admits it to a ready queue.
    pub fn register_task(
        &mut self,
        entry: TaskEntry,
        arg: usize,
        priority: Priority,
    ) -> Result<TaskId, KernelError> {
        if self.stack_base == 0 || self.started {
            return Err(KernelError::BadContext);
        }
        if self.task_count >= MAX_TASKS {
            return Err(KernelError::CapacityExceeded);
        }

        let id = self.task_count;
        let stack_top = (self.stack_base - id * STACK_SIZE) & !0x07;
        let tcb = &mut self.tasks[id];
        tcb.init(id, priority, stack_top);

        let frame = synthesize_initial_frame(entry, arg);
        // Safety: `[stack_top - STACK_SIZE, stack_top)` lies inside the
        // arena adopted by `initialize` and belongs to this task alone.
        tcb.stack_pointer = unsafe { frame.push(stack_top as *mut u32) };

        self.task_count += 1;
        debug!(
            "registered task {} ({:?}), stack {:#x}..{:#x}",
            id,
            priority,
            tcb.stack_bottom(),
            stack_top
        );
        Ok(id)
    }

    /// Admit a registered, Inactive task to its ready queue.
    pub fn activate(&mut self, id: TaskId) -> Result<(), KernelError> {
        let tcb = self.tasks[..self.task_count]
            .get_mut(id)
            .ok_or(KernelError::BadId)?;
        if tcb.state != TaskState::Inactive {
            return Err(KernelError::BadId);
        }
        self.ready.enqueue(tcb)
    }

    /// The first task registered at [`Priority::Idle`].
    pub fn idle_task(&self) -> Option<TaskId> {
        self.tasks[..self.task_count]
            .iter()
            .find(|t| t.base_priority == Priority::Idle)
            .map(|t| t.id)
    }

    /// Begin scheduling.
    ///
    /// Every Inactive task except the idle task is admitted to its ready
    /// queue; the idle task becomes the current task. Returns the idle
    /// task's saved stack pointer, from which the port performs the first
    /// dispatch.
    pub fn start(&mut self) -> Result<*mut u32, KernelError> {
        if self.started {
            return Err(KernelError::BadContext);
        }
        let idle = self.idle_task().ok_or(KernelError::NoIdleTask)?;
        if self.tasks[idle].state != TaskState::Inactive {
            return Err(KernelError::BadContext);
        }

        for id in 0..self.task_count {
            if id != idle && self.tasks[id].state == TaskState::Inactive {
                self.activate(id)?;
            }
        }

        let tcb = &mut self.tasks[idle];
        tcb.state = TaskState::Running;
        self.current = Some(idle);
        self.started = true;
        debug!("scheduler started with {} tasks, idle task {}", self.task_count, idle);
        Ok(tcb.stack_pointer)
    }

    // -----------------------------------------------------------------------
    // Scheduling decisions
    // -----------------------------------------------------------------------

    /// Called from the SysTick handler every tick.
    ///
    /// A switch that was decided but not yet carried out is reported again
    /// instead of making a second decision over it.
    pub fn tick(&mut self) -> Result<Dispatch, KernelError> {
        self.tick_count = self.tick_count.wrapping_add(1);

        let Some(current) = self.current else {
            return Ok(Dispatch::Keep);
        };
        let tcb = &mut self.tasks[current];
        tcb.run_ticks = tcb.run_ticks.wrapping_add(1);

        if let Some(next) = self.next {
            return Ok(Dispatch::SwitchTo(next));
        }
        self.reschedule()
    }

    /// Move the running task to the back of its FIFO and pick again.
    pub fn yield_current(&mut self) -> Result<Dispatch, KernelError> {
        self.running_task()?;
        self.reschedule()
    }

    /// Block the running task in `wait_queue` and pick its successor.
    pub fn block_current(&mut self, wait_queue: &mut TaskQueue) -> Result<Dispatch, KernelError> {
        let current = self.running_task()?;
        let tcb = &mut self.tasks[current];
        wait_queue.push_back(tcb, QueueLink::Wait)?;
        tcb.state = TaskState::Blocked;
        trace!("task {} blocked", current);
        self.select()
    }

    /// Terminate the running task and pick its successor. The idle task
    /// must stay runnable and cannot exit.
    pub fn exit_current(&mut self) -> Result<Dispatch, KernelError> {
        let current = self.running_task()?;
        if self.idle_task() == Some(current) {
            return Err(KernelError::IdleTaskExit);
        }
        self.tasks[current].state = TaskState::Terminated;
        debug!("task {} terminated", current);
        self.select()
    }

    /// Preempt the running task if a strictly more urgent level became
    /// occupied, e.g. after a wake-up.
    pub fn preempt_if_higher(&mut self) -> Result<Dispatch, KernelError> {
        if let Some(next) = self.next {
            return Ok(Dispatch::SwitchTo(next));
        }
        let Ok(current) = self.running_task() else {
            return Ok(Dispatch::Keep);
        };
        match self.ready.highest_level() {
            Some(level) if level > self.tasks[current].priority => self.reschedule(),
            _ => Ok(Dispatch::Keep),
        }
    }

    fn reschedule(&mut self) -> Result<Dispatch, KernelError> {
        if let Some(current) = self.current {
            if self.tasks[current].state == TaskState::Running {
                self.ready.enqueue(&mut self.tasks[current])?;
            }
        }
        self.select()
    }

    /// Take the head of the highest occupied level.
    fn select(&mut self) -> Result<Dispatch, KernelError> {
        debug_assert!(self.next.is_none(), "scheduling over a pending switch");

        let level = self.ready.highest_level().ok_or(KernelError::NoReadyTask)?;
        let id = self.ready.dequeue(level)?;
        let tcb = &mut self.tasks[id];
        tcb.queue = None;

        if self.current == Some(id) {
            tcb.state = TaskState::Running;
            Ok(Dispatch::Keep)
        } else {
            trace!("tick {}: switch {:?} -> {}", self.tick_count, self.current, id);
            self.next = Some(id);
            Ok(Dispatch::SwitchTo(id))
        }
    }

    // -----------------------------------------------------------------------
    // Context switch bookkeeping
    // -----------------------------------------------------------------------

    /// Bookkeeping half of the context switch, run by the PendSV handler
    /// after it pushed R4–R11 of the outgoing task.
    ///
    /// Stores `outgoing_sp` in the outgoing TCB, makes the pending target
    /// current and returns its saved stack pointer. A PendSV with no pending
    /// target returns `outgoing_sp` unchanged.
    pub fn switch_context(&mut self, outgoing_sp: *mut u32) -> *mut u32 {
        let Some(incoming) = self.next.take() else {
            return outgoing_sp;
        };

        if let Some(outgoing) = self.current {
            let tcb = &mut self.tasks[outgoing];
            debug_assert_ne!(tcb.state, TaskState::Running);
            tcb.stack_pointer = outgoing_sp;
        }

        let tcb = &mut self.tasks[incoming];
        tcb.state = TaskState::Running;
        self.current = Some(incoming);
        self.switch_count = self.switch_count.wrapping_add(1);
        tcb.stack_pointer
    }

    // -----------------------------------------------------------------------
    // Wake-up and priority helpers for the sync primitives
    // -----------------------------------------------------------------------

    /// Remove the head of `wait_queue` and unlink it.
    pub fn pop_waiter(&mut self, wait_queue: &mut TaskQueue) -> Option<TaskId> {
        let id = wait_queue.pop_front()?;
        self.tasks[id].queue = None;
        Some(id)
    }

    /// Put a Blocked, unlinked task back into the ready queue of its
    /// current priority.
    pub fn make_ready(&mut self, id: TaskId) -> Result<(), KernelError> {
        let tcb = self.tasks[..self.task_count]
            .get_mut(id)
            .ok_or(KernelError::BadId)?;
        if tcb.state != TaskState::Blocked || tcb.queue.is_some() {
            return Err(KernelError::BadId);
        }
        self.ready.enqueue(tcb)?;
        trace!("task {} woken", id);
        Ok(())
    }

    /// Wake the longest-waiting task of `wait_queue`.
    pub fn wake_one(&mut self, wait_queue: &mut TaskQueue) -> Result<Option<TaskId>, KernelError> {
        match self.pop_waiter(wait_queue) {
            Some(id) => {
                self.make_ready(id)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// A task that is not in a ready queue, whose effective priority may
    /// therefore change.
    fn unqueued_task(&mut self, id: TaskId) -> Result<&mut TaskControlBlock, KernelError> {
        let tcb = self.tasks[..self.task_count]
            .get_mut(id)
            .ok_or(KernelError::BadId)?;
        if matches!(tcb.queue, Some(QueueLink::Ready(_))) {
            return Err(KernelError::BadContext);
        }
        Ok(tcb)
    }

    /// Record that `id` took a mutex and boost it to [`Priority::CEILING`].
    pub fn hold_lock(&mut self, id: TaskId) -> Result<(), KernelError> {
        let tcb = self.unqueued_task(id)?;
        tcb.locks_held = tcb.locks_held.checked_add(1).ok_or(KernelError::Overflow)?;
        tcb.priority = Priority::CEILING;
        Ok(())
    }

    /// Record that `id` gave up a mutex. Once it holds none, it drops back
    /// to its base priority.
    pub fn release_lock(&mut self, id: TaskId) -> Result<(), KernelError> {
        let tcb = self.unqueued_task(id)?;
        tcb.locks_held = tcb.locks_held.checked_sub(1).ok_or(KernelError::NotOwner)?;
        if tcb.locks_held == 0 {
            tcb.priority = tcb.base_priority;
        }
        Ok(())
    }

    /// The current task, provided it is Running.
    pub fn running_task(&self) -> Result<TaskId, KernelError> {
        match self.current {
            Some(id) if self.tasks[id].state == TaskState::Running => Ok(id),
            _ => Err(KernelError::BadContext),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    /// The switch target waiting for PendSV, if any.
    pub fn pending_switch(&self) -> Option<TaskId> {
        self.next
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskControlBlock> {
        self.tasks[..self.task_count].get(id)
    }

    pub fn task_count(&self) -> usize {
        self.task_count
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn ready_queues(&self) -> &ReadyQueues {
        &self.ready
    }

    /// Check the structural invariants: bitmap consistency, and every task
    /// linked into at most one of the ready queues and `wait_queues`, in
    /// agreement with its state.
    pub fn check_invariants(&self, wait_queues: &[&TaskQueue]) -> bool {
        if !self.ready.is_consistent() {
            return false;
        }

        let mut running = 0;
        for tcb in &self.tasks[..self.task_count] {
            let ready_hits: usize = Priority::ALL
                .iter()
                .map(|&p| self.ready.queue(p).iter().filter(|&id| id == tcb.id).count())
                .sum();
            let wait_hits: usize = wait_queues
                .iter()
                .map(|q| q.iter().filter(|&id| id == tcb.id).count())
                .sum();

            let linked_ok = match (ready_hits, wait_hits) {
                (0, 0) => tcb.queue.is_none(),
                (1, 0) => {
                    tcb.queue == Some(QueueLink::Ready(tcb.priority))
                        && tcb.state == TaskState::Ready
                        && self.ready.queue(tcb.priority).contains(tcb.id)
                }
                (0, 1) => tcb.queue == Some(QueueLink::Wait) && tcb.state == TaskState::Blocked,
                _ => false,
            };
            if !linked_ok {
                return false;
            }
            if tcb.state == TaskState::Running {
                running += 1;
            }
        }
        running <= 1
    }
}

impl Default for Scheduler {
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
    use crate::frame::Frame;
    use crate::task::StackArena;

    extern "C" fn idle(_: usize) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    extern "C" fn worker(_: usize) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn make_scheduler() -> Scheduler {
        let arena = Box::leak(Box::new(StackArena::new()));
        let mut s = Scheduler::new();
        s.initialize(arena.base()).unwrap();
        s
    }

    /// Tick once and carry out any resulting switch. Returns the task that
    /// runs afterwards.
    fn run_tick(s: &mut Scheduler) -> TaskId {
        if let Dispatch::SwitchTo(_) = s.tick().unwrap() {
            let sp = s.task(s.current().unwrap()).unwrap().stack_pointer;
            s.switch_context(sp);
        }
        s.current().unwrap()
    }

    #[test]
    fn test_initialize_rejects_bad_base() {
        let mut s = Scheduler::new();
        assert_eq!(s.initialize(0), Err(KernelError::InvalidStackBase));
        assert_eq!(s.initialize(0x1000_8004), Err(KernelError::InvalidStackBase));
    }

    #[test]
    fn test_register_before_initialize() {
        let mut s = Scheduler::new();
        assert_eq!(
            s.register_task(worker, 0, Priority::Low),
            Err(KernelError::BadContext)
        );
    }

    #[test]
    fn test_registration_synthesizes_frame() {
        let mut s = make_scheduler();
        let id = s.register_task(worker, 0x55, Priority::Normal).unwrap();
        let tcb = s.task(id).unwrap();

        assert_eq!(tcb.state, TaskState::Inactive);
        assert_eq!(tcb.priority, Priority::Normal);
        assert_eq!(tcb.base_priority, Priority::Normal);
        assert_eq!(tcb.stack_pointer as usize, tcb.stack_top - 64);

        let (frame, above) = unsafe { Frame::pop(tcb.stack_pointer) };
        assert_eq!(above as usize, tcb.stack_top);
        assert_eq!(frame.pc, worker as usize as u32 & !1);
        assert_eq!(frame.r0, 0x55);
        assert_eq!(frame.xpsr, 0x0100_0000);
        assert_eq!(frame.r4_r11[0], 0x0404_0404);

        // Registration alone never schedules anything
        assert_eq!(s.ready_queues().highest_level(), None);
    }

    #[test]
    fn test_stack_regions_descend_without_overlap() {
        let mut s = make_scheduler();
        for _ in 0..MAX_TASKS {
            s.register_task(worker, 0, Priority::Low).unwrap();
        }
        for id in 1..MAX_TASKS {
            let prev = s.task(id - 1).unwrap();
            let this = s.task(id).unwrap();
            assert_eq!(this.stack_top, prev.stack_bottom());
            assert!(this.stack_top < prev.stack_top);
        }
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut s = make_scheduler();
        for _ in 0..MAX_TASKS {
            s.register_task(worker, 0, Priority::Low).unwrap();
        }
        assert_eq!(
            s.register_task(worker, 0, Priority::Low),
            Err(KernelError::CapacityExceeded)
        );
    }

    #[test]
    fn test_start_requires_idle_task() {
        let mut s = make_scheduler();
        s.register_task(worker, 0, Priority::Low).unwrap();
        assert_eq!(s.start(), Err(KernelError::NoIdleTask));
    }

    #[test]
    fn test_start_runs_idle_first() {
        let mut s = make_scheduler();
        let t = s.register_task(worker, 0, Priority::High).unwrap();
        let i = s.register_task(idle, 0, Priority::Idle).unwrap();

        let sp = s.start().unwrap();
        assert_eq!(sp, s.task(i).unwrap().stack_pointer);
        assert_eq!(s.current(), Some(i));
        assert_eq!(s.task(i).unwrap().state, TaskState::Running);
        assert_eq!(s.task(t).unwrap().state, TaskState::Ready);
        assert!(s.check_invariants(&[]));

        assert_eq!(
            s.register_task(worker, 0, Priority::Low),
            Err(KernelError::BadContext)
        );
        assert_eq!(s.start(), Err(KernelError::BadContext));
    }

    #[test]
    fn test_initialize_after_start_is_rejected() {
        let arena = Box::leak(Box::new(StackArena::new()));
        let mut s = Scheduler::new();
        s.initialize(arena.base()).unwrap();
        let i = s.register_task(idle, 0, Priority::Idle).unwrap();
        let t = s.register_task(worker, 0, Priority::Low).unwrap();
        s.start().unwrap();

        assert_eq!(s.initialize(arena.base()), Err(KernelError::BadContext));

        // Nothing was reset
        assert!(s.is_started());
        assert_eq!(s.current(), Some(i));
        assert_eq!(s.task_count(), 2);
        assert_eq!(s.task(t).unwrap().state, TaskState::Ready);
        assert_eq!(s.tick(), Ok(Dispatch::SwitchTo(t)));
    }

    #[test]
    fn test_tick_switches_to_higher_priority() {
        let mut s = make_scheduler();
        let i = s.register_task(idle, 0, Priority::Idle).unwrap();
        let h = s.register_task(worker, 0, Priority::High).unwrap();
        s.start().unwrap();

        assert_eq!(s.tick(), Ok(Dispatch::SwitchTo(h)));
        assert_eq!(s.pending_switch(), Some(h));
        // The idle task went back to its ready queue
        assert_eq!(s.task(i).unwrap().state, TaskState::Ready);
        assert!(s.check_invariants(&[]));

        let idle_sp = s.task(i).unwrap().stack_pointer;
        let sp = s.switch_context(idle_sp);
        assert_eq!(sp, s.task(h).unwrap().stack_pointer);
        assert_eq!(s.current(), Some(h));
        assert_eq!(s.task(h).unwrap().state, TaskState::Running);
        assert_eq!(s.switch_count(), 1);
        assert!(s.check_invariants(&[]));
    }

    #[test]
    fn test_tick_keeps_sole_highest_task() {
        let mut s = make_scheduler();
        s.register_task(idle, 0, Priority::Idle).unwrap();
        let h = s.register_task(worker, 0, Priority::High).unwrap();
        s.start().unwrap();
        assert_eq!(run_tick(&mut s), h);

        for _ in 0..5 {
            assert_eq!(s.tick(), Ok(Dispatch::Keep));
            assert_eq!(s.current(), Some(h));
        }
        assert_eq!(s.task(h).unwrap().run_ticks, 5);
        assert_eq!(s.switch_count(), 1);
    }

    #[test]
    fn test_tick_while_switch_pending() {
        let mut s = make_scheduler();
        s.register_task(idle, 0, Priority::Idle).unwrap();
        let a = s.register_task(worker, 0, Priority::Normal).unwrap();
        s.register_task(worker, 0, Priority::Normal).unwrap();
        s.start().unwrap();

        assert_eq!(s.tick(), Ok(Dispatch::SwitchTo(a)));
        // A nested tick must not pick a second target over the first
        assert_eq!(s.tick(), Ok(Dispatch::SwitchTo(a)));
        assert!(s.check_invariants(&[]));
    }

    #[test]
    fn test_spurious_switch_keeps_stack() {
        let mut s = make_scheduler();
        let i = s.register_task(idle, 0, Priority::Idle).unwrap();
        s.start().unwrap();
        let sp = 0x1234_5678usize as *mut u32;
        assert_eq!(s.switch_context(sp), sp);
        assert_eq!(s.current(), Some(i));
        assert_eq!(s.switch_count(), 0);
    }

    #[test]
    fn test_yield_round_robin() {
        let mut s = make_scheduler();
        s.register_task(idle, 0, Priority::Idle).unwrap();
        let a = s.register_task(worker, 0, Priority::Low).unwrap();
        let b = s.register_task(worker, 0, Priority::Low).unwrap();
        s.start().unwrap();
        assert_eq!(run_tick(&mut s), a);

        assert_eq!(s.yield_current(), Ok(Dispatch::SwitchTo(b)));
        let sp = s.task(a).unwrap().stack_pointer;
        s.switch_context(sp);
        assert_eq!(s.current(), Some(b));
        assert_eq!(s.ready_queues().queue(Priority::Low).front(), Some(a));
    }

    #[test]
    fn test_exit_current() {
        let mut s = make_scheduler();
        let i = s.register_task(idle, 0, Priority::Idle).unwrap();
        let t = s.register_task(worker, 0, Priority::Normal).unwrap();
        s.start().unwrap();

        // Idle must never terminate
        assert_eq!(s.exit_current(), Err(KernelError::IdleTaskExit));

        assert_eq!(run_tick(&mut s), t);
        assert_eq!(s.exit_current(), Ok(Dispatch::SwitchTo(i)));
        let sp = s.task(t).unwrap().stack_pointer;
        s.switch_context(sp);
        assert_eq!(s.task(t).unwrap().state, TaskState::Terminated);

        // A terminated task is never picked again
        for _ in 0..4 {
            assert_eq!(run_tick(&mut s), i);
        }
        assert!(s.check_invariants(&[]));
    }

    #[test]
    fn test_blocked_idle_is_fatal() {
        let mut s = make_scheduler();
        s.register_task(idle, 0, Priority::Idle).unwrap();
        s.start().unwrap();
        let mut wq = TaskQueue::new();
        assert_eq!(s.block_current(&mut wq), Err(KernelError::NoReadyTask));
        assert!(KernelError::NoReadyTask.is_fatal());
    }

    #[test]
    fn test_block_and_wake() {
        let mut s = make_scheduler();
        let i = s.register_task(idle, 0, Priority::Idle).unwrap();
        let t = s.register_task(worker, 0, Priority::Normal).unwrap();
        s.start().unwrap();
        assert_eq!(run_tick(&mut s), t);

        let mut wq = TaskQueue::new();
        assert_eq!(s.block_current(&mut wq), Ok(Dispatch::SwitchTo(i)));
        assert_eq!(s.task(t).unwrap().state, TaskState::Blocked);
        assert!(s.check_invariants(&[&wq]));
        let sp = s.task(t).unwrap().stack_pointer;
        s.switch_context(sp);

        assert_eq!(s.wake_one(&mut wq), Ok(Some(t)));
        assert_eq!(s.task(t).unwrap().state, TaskState::Ready);
        assert!(wq.is_empty());
        assert!(s.check_invariants(&[&wq]));

        assert_eq!(s.preempt_if_higher(), Ok(Dispatch::SwitchTo(t)));
        assert_eq!(s.wake_one(&mut wq), Ok(None));
    }

    #[test]
    fn test_lock_accounting_rejects_queued_task() {
        let mut s = make_scheduler();
        s.register_task(idle, 0, Priority::Idle).unwrap();
        let t = s.register_task(worker, 0, Priority::Low).unwrap();
        s.start().unwrap();
        assert_eq!(s.hold_lock(t), Err(KernelError::BadContext));
        assert_eq!(s.hold_lock(MAX_TASKS), Err(KernelError::BadId));
        assert_eq!(s.task(t).unwrap().priority, Priority::Low);
    }

    #[test]
    fn test_release_lock_without_hold() {
        let mut s = make_scheduler();
        let i = s.register_task(idle, 0, Priority::Idle).unwrap();
        s.start().unwrap();
        assert_eq!(s.release_lock(i), Err(KernelError::NotOwner));

        s.hold_lock(i).unwrap();
        s.hold_lock(i).unwrap();
        s.release_lock(i).unwrap();
        assert_eq!(s.task(i).unwrap().priority, Priority::CEILING);
        s.release_lock(i).unwrap();
        assert_eq!(s.task(i).unwrap().priority, Priority::Idle);
        assert_eq!(s.task(i).unwrap().locks_held, 0);
    }
}
