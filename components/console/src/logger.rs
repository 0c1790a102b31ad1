//! Log sink backed by the installed console
//!
//! Each record goes out as `[LEVEL target] message` followed by a newline.
//! Records logged before a console is installed are dropped.
//!
//! The console's own read/write path never logs, so this sink cannot
//! re-enter the ring it is writing to.

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` implementation writing through [`crate::installed`]
pub struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// Install as the global logger
    ///
    /// # Errors
    /// Fails if another logger was already installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.level);
        Ok(())
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Some(console) = crate::installed() {
            let _ = writeln!(
                console.writer(),
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
