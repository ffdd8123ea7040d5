use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Logger writing every record to STDERR, prefixed with a colored level
struct Logger {
    level: LevelFilter,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let label = match record.level() {
            Level::Error => "ERROR".bright_red(),
            Level::Warn => "WARN ".bright_yellow(),
            Level::Info => "INFO ".bright_blue(),
            Level::Debug => "DEBUG".bright_magenta(),
            Level::Trace => "TRACE".bright_black(),
        };

        eprintln!("{label} {}", record.args());
    }

    fn flush(&self) {}
}

/// Install the logger globally
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(Logger { level }))?;
    log::set_max_level(level);
    Ok(())
}
