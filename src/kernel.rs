//! # Kernel
//!
//! The global scheduler instance and the public kernel API.
//!
//! The one [`Scheduler`] value lives in a `critical_section::Mutex`; every
//! entry point below, as well as the tick and context-switch hooks called by
//! the port, reaches it through [`with_scheduler`] with interrupts disabled.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()            ← adopt the stack arena
//!         ├─► kernel::register_task()   ← idle task + application tasks
//!         └─► kernel::start()           ← no return
//!               ├─► activate tasks, idle becomes current
//!               ├─► program SysTick, set exception priorities
//!               └─► dispatch the idle task from its synthesized frame
//! ```

use core::cell::{RefCell, RefMut, UnsafeCell};
use core::mem::size_of;

use ::critical_section::Mutex as CsMutex;
use log::error;

use crate::arch::port;
use crate::error::KernelError;
use crate::frame::TaskEntry;
use crate::scheduler::{Dispatch, Scheduler};
use crate::sync::{critical_section, CriticalSection};
use crate::task::{Priority, StackArena, TaskId, TaskState};

// ---------------------------------------------------------------------------
// Global state
// ---------------------------------------------------------------------------

static SCHEDULER: CsMutex<RefCell<Scheduler>> = CsMutex::new(RefCell::new(Scheduler::new()));

/// Memory for the task stacks. Only ever accessed through raw pointers
/// handed out by the scheduler, one region per task.
struct TaskStacks(UnsafeCell<StackArena>);

// Safety: the arena is never borrowed; each task's region is only touched
// by that task and by the context switch of that task.
unsafe impl Sync for TaskStacks {}

static TASK_STACKS: TaskStacks = TaskStacks(UnsafeCell::new(StackArena::new()));

fn stack_base() -> usize {
    TASK_STACKS.0.get() as usize + size_of::<StackArena>()
}

/// Borrow the scheduler for the duration of a critical section.
pub(crate) fn scheduler<'cs>(cs: CriticalSection<'cs>) -> RefMut<'cs, Scheduler> {
    SCHEDULER.borrow_ref_mut(cs)
}

/// Run `f` on the global scheduler with interrupts disabled.
pub fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    critical_section(|cs| f(&mut scheduler(cs)))
}

/// Ask the port for a context switch if `dispatch` names a new task.
pub(crate) fn request_switch(dispatch: Dispatch) {
    if let Dispatch::SwitchTo(_) = dispatch {
        port::pend_context_switch();
    }
}

/// Log an unrecoverable error and halt.
fn fatal(err: KernelError) -> ! {
    error!("fatal kernel error: {}", err);
    panic!("fatal kernel error: {}", err);
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Reset the kernel over the static stack arena.
///
/// Must be called before any task is registered. Calling it again before
/// [`launch`] discards all registered tasks; afterwards it fails with
/// [`KernelError::BadContext`].
pub fn init() -> Result<(), KernelError> {
    let base = stack_base();
    with_scheduler(|s| s.initialize(base))
}

/// Register a task. It is admitted to its ready queue when the kernel
/// starts.
///
/// # Example
/// ```ignore
/// extern "C" fn blink(led: usize) -> ! {
///     loop {
///         toggle(led);
///         kernel::delay(500);
///     }
/// }
///
/// kernel::register_task(blink, 3, Priority::Low)?;
/// ```
pub fn register_task(
    entry: TaskEntry,
    arg: usize,
    priority: Priority,
) -> Result<TaskId, KernelError> {
    with_scheduler(|s| s.register_task(entry, arg, priority))
}

/// Activate the registered tasks and make the idle task current. Returns
/// the stack pointer the port dispatches the idle task from.
///
/// [`start`] calls this; a port that brings its own startup code calls it
/// directly.
pub fn launch() -> Result<*mut u32, KernelError> {
    with_scheduler(|s| s.start())
}

/// Start multitasking. **Does not return.**
///
/// Interrupts stay disabled until the idle task is dispatched, so the
/// first tick cannot arrive before a task is running.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn start(mut peripherals: cortex_m::Peripherals, config: crate::config::KernelConfig) -> ! {
    use crate::arch::armv7m;

    cortex_m::interrupt::disable();

    let Some(reload) = config.systick_reload() else {
        error!(
            "cannot derive a {} Hz tick from a {} Hz clock",
            config.tick_hz, config.core_clock_hz
        );
        panic!("invalid tick configuration");
    };

    let first_sp = match launch() {
        Ok(sp) => sp,
        Err(err) => fatal(err),
    };

    armv7m::set_interrupt_priorities(&mut peripherals.SCB);
    armv7m::configure_systick(&mut peripherals.SYST, reload);

    // Safety: `first_sp` addresses the idle task's synthesized frame and
    // this is the only dispatch that does not go through PendSV.
    unsafe { armv7m::start_first_task(first_sp) }
}

// ---------------------------------------------------------------------------
// Port hooks
// ---------------------------------------------------------------------------

/// Tick source contract: call exactly once per tick period.
pub fn on_tick() {
    match with_scheduler(|s| s.tick()) {
        Ok(dispatch) => request_switch(dispatch),
        Err(err) => fatal(err),
    }
}

/// Bookkeeping half of the context switch. Takes the outgoing task's stack
/// pointer after its callee-saved registers were pushed and returns the
/// stack pointer to restore them from.
pub fn on_context_switch(outgoing_sp: *mut u32) -> *mut u32 {
    with_scheduler(|s| s.switch_context(outgoing_sp))
}

// ---------------------------------------------------------------------------
// Task API
// ---------------------------------------------------------------------------

/// Give up the rest of the current tick to the next task of the same
/// priority, if there is one.
pub fn yield_now() -> Result<(), KernelError> {
    with_scheduler(|s| s.yield_current()).map(request_switch)
}

/// Terminate the calling task. **Does not return.**
pub fn exit() -> ! {
    match with_scheduler(|s| s.exit_current()) {
        Ok(dispatch) => request_switch(dispatch),
        Err(err) => fatal(err),
    }
    // The pended switch takes effect as soon as this returns to thread mode
    loop {
        port::wait_for_interrupt();
    }
}

pub fn current_task() -> Option<TaskId> {
    with_scheduler(|s| s.current())
}

/// Ticks since the kernel started.
pub fn ticks() -> u64 {
    with_scheduler(|s| s.tick_count())
}

/// Busy-wait until `ticks` more ticks have elapsed. The caller stays
/// runnable, so tasks of lower priority do not run in the meantime.
pub fn delay(ticks: u64) {
    let start = self::ticks();
    while self::ticks().wrapping_sub(start) < ticks {
        port::wait_for_interrupt();
    }
}

/// Effective priority of a task, including any mutex boost.
pub fn task_priority(id: TaskId) -> Option<Priority> {
    with_scheduler(|s| s.task(id).map(|t| t.priority))
}

pub fn task_state(id: TaskId) -> Option<TaskState> {
    with_scheduler(|s| s.task(id).map(|t| t.state))
}
