//! # fprtos
//!
//! A small preemptive, fixed-priority real-time kernel for single-core
//! ARM Cortex-M3/M4 microcontrollers.
//!
//! ## Overview
//!
//! Tasks are registered statically before the kernel starts, each with its
//! own stack region and one of five priority levels. A periodic SysTick
//! interrupt makes the scheduling decision; the PendSV exception performs
//! the context switch. Tasks of equal priority are round-robined at tick
//! boundaries and a more urgent level always wins.
//!
//! Tasks coordinate through counting semaphores and a mutex that boosts
//! its owner to the ceiling priority. Blocking suspends the caller
//! immediately; it never spins.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Tasks                    │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │     init() · register_task() · start() · yield_now()   │
//! ├──────────────────────────┬─────────────────────────────┤
//! │  Scheduler               │  Sync Primitives            │
//! │  scheduler.rs            │  sync/                      │
//! │  ─ tick()                │  ─ Semaphore                │
//! │  ─ switch_context()      │  ─ Mutex (ceiling boost)    │
//! ├──────────────────────────┴─────────────────────────────┤
//! │  Ready Queues (readyqueue.rs) · Task Model (task.rs)   │
//! │  Saved Register Frame (frame.rs)                       │
//! ├────────────────────────────────────────────────────────┤
//! │  Arch Port (arch/armv7m.rs, arch/host.rs)              │
//! │  PendSV · SysTick · First Dispatch                     │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M3/M4 Hardware (Thumb-2)             │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **Fixed-size TCB array**: `[TaskControlBlock; MAX_TASKS]`
//! - **Stack arena**: `MAX_TASKS` regions of `STACK_SIZE` bytes, carved
//!   downward from one base address
//! - **Critical sections**: the `critical-section` crate; every access to
//!   the scheduler happens with interrupts disabled

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod error;
pub mod frame;
pub mod kernel;
pub mod readyqueue;
pub mod scheduler;
pub mod sync;
pub mod task;

pub use error::KernelError;
