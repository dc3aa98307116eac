//! # Configuration
//!
//! Compile-time constants governing the kernel, plus the runtime tick
//! configuration handed to [`crate::kernel::start`].
//! All limits are fixed at compile time; nothing is allocated dynamically.

/// Maximum number of tasks the kernel can manage. Bounds the static TCB
/// array and the stack arena; each task consumes `STACK_SIZE` bytes of RAM.
pub const MAX_TASKS: usize = 6;

/// Per-task stack size in bytes. Must be large enough for the deepest call
/// chain plus the hardware exception frame (32 bytes) and the
/// software-saved context (32 bytes for R4–R11).
pub const STACK_SIZE: usize = 1024;

/// Per-task stack size in 32-bit words.
pub const STACK_WORDS: usize = STACK_SIZE / 4;

/// Default SysTick frequency in Hz.
pub const TICK_HZ: u32 = 1000;

/// Core clock of the reference board (LPC1768 at 100 MHz).
pub const SYSTEM_CLOCK_HZ: u32 = 100_000_000;

/// Exception priority of SysTick. More urgent than PendSV so the tick's
/// bookkeeping always completes before a switch is carried out.
pub const SYSTICK_PRIORITY: u8 = 0x80;

/// Exception priority of PendSV (lowest).
pub const PENDSV_PRIORITY: u8 = 0xFF;

/// Largest value the 24-bit SysTick reload register accepts.
const SYSTICK_MAX_RELOAD: u32 = 0x00FF_FFFF;

/// Tick source configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Frequency of the clock feeding SysTick.
    pub core_clock_hz: u32,
    /// Scheduler tick rate.
    pub tick_hz: u32,
}

impl KernelConfig {
    pub const DEFAULT: Self = Self {
        core_clock_hz: SYSTEM_CLOCK_HZ,
        tick_hz: TICK_HZ,
    };

    /// SysTick reload value for this configuration, or `None` if the tick
    /// rate is zero or the period does not fit the 24-bit counter.
    pub const fn systick_reload(&self) -> Option<u32> {
        if self.tick_hz == 0 || self.tick_hz > self.core_clock_hz {
            return None;
        }
        let reload = self.core_clock_hz / self.tick_hz - 1;
        if reload > SYSTICK_MAX_RELOAD {
            None
        } else {
            Some(reload)
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reload() {
        assert_eq!(KernelConfig::DEFAULT.systick_reload(), Some(99_999));
    }

    #[test]
    fn test_reload_out_of_range() {
        // 1 Hz at 100 MHz needs a 27-bit counter
        let config = KernelConfig { core_clock_hz: SYSTEM_CLOCK_HZ, tick_hz: 1 };
        assert_eq!(config.systick_reload(), None);

        let config = KernelConfig { core_clock_hz: SYSTEM_CLOCK_HZ, tick_hz: 0 };
        assert_eq!(config.systick_reload(), None);
    }

    #[test]
    fn test_stack_words() {
        assert_eq!(STACK_WORDS * 4, STACK_SIZE);
        assert_eq!(STACK_SIZE % 8, 0);
    }
}
