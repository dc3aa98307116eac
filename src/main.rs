//! # fprtos Demo Firmware
//!
//! Exercises the kernel on an LPC1768-class board with five tasks:
//!
//! | Task       | Priority | Behavior                                        |
//! |------------|----------|-------------------------------------------------|
//! | `idle`     | Idle     | Sleeps until the next interrupt                 |
//! | `ticker`   | Low      | Signals `SAMPLE_DUE` every 100 ticks            |
//! | `reporter` | Low      | Logs the sample count under the `CONSOLE` lock  |
//! | `greeter`  | Normal   | Logs once under the `CONSOLE` lock, then exits  |
//! | `sampler`  | High     | Waits on `SAMPLE_DUE`, takes a sample           |
//!
//! The two Low tasks share the CPU round-robin at tick boundaries. The
//! sampler preempts them whenever the ticker signals, and runs at the
//! ceiling priority while it holds `CONSOLE`.
//!
//! Build with `--features rt,output-semihosting` to see the log.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use log::{error, info};
use panic_halt as _;

use fprtos::config::KernelConfig;
use fprtos::error::KernelError;
use fprtos::kernel;
use fprtos::sync::{Mutex, Semaphore};
use fprtos::task::Priority;

#[cfg(feature = "output-semihosting")]
mod logger_semihosting;

static SAMPLE_DUE: Semaphore = Semaphore::new(0);
static CONSOLE: Mutex = Mutex::new();
static SAMPLES: AtomicU32 = AtomicU32::new(0);

/// Log a failed kernel call and carry on.
fn check(result: Result<(), KernelError>) {
    if let Err(err) = result {
        error!("task {:?}: {}", kernel::current_task(), err);
    }
}

// ---------------------------------------------------------------------------
// Task entry points
// ---------------------------------------------------------------------------

extern "C" fn idle(_: usize) -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

extern "C" fn ticker(period: usize) -> ! {
    loop {
        kernel::delay(period as u64);
        check(SAMPLE_DUE.signal());
    }
}

extern "C" fn sampler(_: usize) -> ! {
    loop {
        check(SAMPLE_DUE.wait());
        let n = SAMPLES.fetch_add(1, Ordering::Relaxed) + 1;

        check(CONSOLE.acquire());
        info!("sample {} at tick {}", n, kernel::ticks());
        check(CONSOLE.release());
    }
}

extern "C" fn reporter(period: usize) -> ! {
    loop {
        check(CONSOLE.acquire());
        info!(
            "{} samples after {} ticks",
            SAMPLES.load(Ordering::Relaxed),
            kernel::ticks()
        );
        check(CONSOLE.release());
        kernel::delay(period as u64);
    }
}

extern "C" fn greeter(_: usize) -> ! {
    check(CONSOLE.acquire());
    info!("hello from task {:?}", kernel::current_task());
    check(CONSOLE.release());
    kernel::exit()
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

#[entry]
fn main() -> ! {
    #[cfg(feature = "output-semihosting")]
    logger_semihosting::init(log::LevelFilter::Debug);

    let cp = cortex_m::Peripherals::take().unwrap();

    kernel::init().expect("kernel init");

    kernel::register_task(idle, 0, Priority::Idle).expect("idle");
    kernel::register_task(ticker, 100, Priority::Low).expect("ticker");
    kernel::register_task(reporter, 500, Priority::Low).expect("reporter");
    kernel::register_task(greeter, 0, Priority::Normal).expect("greeter");
    kernel::register_task(sampler, 0, Priority::High).expect("sampler");

    kernel::start(cp, KernelConfig::DEFAULT)
}
