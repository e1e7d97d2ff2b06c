//! Kernel logger
//!
//! Backs the `log` facade. Each record is formatted as `[LEVEL] message`
//! into a fixed stack buffer (no allocation on the logging path) and handed
//! to the console sink registered at boot.

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use spin::Once;

/// Console output routine (serial port, VGA, host stderr in tests)
pub type ConsoleSink = fn(&str);

const LINE_CAPACITY: usize = 512;

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;
static CONSOLE: Once<ConsoleSink> = Once::new();

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(sink) = CONSOLE.get() else {
            return;
        };

        let level_str = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };

        use core::fmt::Write;
        let mut buf = [0u8; LINE_CAPACITY];
        let mut writer = BufferWriter { buffer: &mut buf, pos: 0 };
        let _ = core::write!(&mut writer, "[{}] {}\n", level_str, record.args());
        let pos = writer.pos;

        sink(utf8_prefix(&buf[..pos]));
    }

    fn flush(&self) {}
}

/// Fixed-size formatting target; silently truncates
pub struct BufferWriter<'a> {
    pub buffer: &'a mut [u8],
    pub pos: usize,
}

impl<'a> core::fmt::Write for BufferWriter<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buffer.len() - self.pos;
        let to_write = bytes.len().min(remaining);

        if to_write > 0 {
            self.buffer[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
        }

        Ok(())
    }
}

/// Longest valid UTF-8 prefix; truncation may split a code point
fn utf8_prefix(bytes: &[u8]) -> &str {
    match core::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
    }
}

/// Installs the kernel logger writing to `sink`.
///
/// Fails if another logger is already installed; the first sink registered
/// stays in place.
pub fn init(sink: ConsoleSink, level: LevelFilter) -> Result<(), SetLoggerError> {
    CONSOLE.call_once(|| sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
