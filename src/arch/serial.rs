//! COM1 output and the `log` backend.

use core::fmt::{self, Write};

use spin::Mutex;
use uart_16550::SerialPort;

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(0x3F8) });

pub fn init() {
    SERIAL.lock().init();
}

#[doc(hidden)]
pub fn print(args: fmt::Arguments) {
    // Logging from a trap must not wait on a lock held by the code it
    // interrupted.
    x86_64::instructions::interrupts::without_interrupts(|| {
        let _ = SERIAL.lock().write_fmt(args);
    });
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::arch::serial::print(format_args!("\n")));
    ($($arg:tt)*) => ($crate::arch::serial::print(format_args!("{}\n", format_args!($($arg)*))));
}

pub struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            crate::serial_println!(
                "[{:5}] {}: {}",
                record.level(),
                record.module_path().unwrap_or("?"),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

pub fn init_logger(level: log::LevelFilter) {
    // A second call keeps the first logger.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
