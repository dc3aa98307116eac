//! `log` backend that prints through the debugger's semihosting console.

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        cortex_m_semihosting::heprintln!(
            "[{level:5} {target}] {args}",
            level = record.level(),
            target = record.target(),
            args = record.args()
        );
    }

    fn flush(&self) {}
}

pub fn init(level: log::LevelFilter) {
    // Safety: called once from `main` before the kernel starts, with no
    // other code running.
    if unsafe { log::set_logger_racy(&Logger) }.is_ok() {
        log::set_max_level(level);
    }
}
