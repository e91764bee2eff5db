use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::{self, IsTerminal, Write};

/// Writes every record to stderr as `LEVEL message`.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl StderrLogger {
    fn color(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1b[91m",
            Level::Warn => "\x1b[93m",
            Level::Info => "\x1b[94m",
            Level::Debug => "\x1b[96m",
            Level::Trace => "\x1b[95m",
        }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut stderr = io::stderr().lock();
        let level = record.level();
        // nowhere left to report a failed write to stderr
        let _ = if stderr.is_terminal() {
            writeln!(stderr, "{}{level:5}\x1b[0m {}", Self::color(level), record.args())
        } else {
            writeln!(stderr, "{level:5} {}", record.args())
        };
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_max_level(level);
    log::set_logger(&LOGGER)
}
