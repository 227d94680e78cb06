//! The level gated logging facade.
use {
    crate::{
        config::{Config, Level},
        error::LogError,
        writer::{open_writer, Writer},
    },
    std::{backtrace::Backtrace, fmt, panic::Location, process, sync::Arc},
};

/// Exit code used by [`Logger::fatal`].
pub const FATAL_EXIT_CODE: i32 = 7;

/// A named, level filtered handle to a [`Writer`].
///
/// Cloning a logger is cheap; clones share the writer. Each call records the
/// caller's file and line, so the methods (and the [`info!`](crate::info)
/// family of macros built on them) report where they were invoked from.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    level: Level,
    writer: Arc<dyn Writer>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Open the writer described by `config` and wrap it in a logger.
    pub fn new(config: &Config) -> Result<Self, LogError> {
        let writer = open_writer(config)?;
        Ok(Self::with_writer(config.name.as_str(), config.level, writer))
    }

    /// Build a logger over an already opened writer.
    pub fn with_writer(name: &str, level: Level, writer: Arc<dyn Writer>) -> Self {
        Logger {
            name: Arc::from(name),
            level,
            writer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn writer(&self) -> &Arc<dyn Writer> {
        &self.writer
    }

    /// Whether a record at `level` would be written.
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level != Level::Off && level >= self.level
    }

    /// Write one record at `level`. Disabled levels return `Ok` without
    /// touching the writer.
    #[track_caller]
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) -> Result<(), LogError> {
        self.log_at(level, Location::caller(), args)
    }

    fn log_at(&self, level: Level, location: &Location<'_>, args: fmt::Arguments<'_>) -> Result<(), LogError> {
        if !self.enabled(level) {
            return Ok(());
        }
        self.writer.log(level, Some(location), args)
    }

    fn report(&self, level: Level, location: &Location<'_>, args: fmt::Arguments<'_>) {
        if let Err(err) = self.log_at(level, location, args) {
            eprintln!("Failed to write {} record for logger '{}': {}", level, self.name, err);
        }
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.report(Level::Debug, Location::caller(), args);
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.report(Level::Info, Location::caller(), args);
    }

    #[track_caller]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.report(Level::Warn, Location::caller(), args);
    }

    #[track_caller]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.report(Level::Error, Location::caller(), args);
    }

    /// Log at error level followed by the current stack trace.
    #[track_caller]
    pub fn error_stack(&self, args: fmt::Arguments<'_>) {
        let location = Location::caller();
        if self.enabled(Level::Error) {
            let trace = Backtrace::force_capture();
            self.report(Level::Error, location, format_args!("{args}\n{trace}"));
        }
    }

    /// Log at fatal level, close this logger's writer and exit the process
    /// with [`FATAL_EXIT_CODE`]. The process exits even when the level is
    /// filtered out.
    #[track_caller]
    pub fn fatal(&self, args: fmt::Arguments<'_>) -> ! {
        self.report(Level::Fatal, Location::caller(), args);
        self.shutdown()
    }

    /// Like [`Logger::fatal`], with the current stack trace appended.
    #[track_caller]
    pub fn fatal_stack(&self, args: fmt::Arguments<'_>) -> ! {
        let location = Location::caller();
        if self.enabled(Level::Fatal) {
            let trace = Backtrace::force_capture();
            self.report(Level::Fatal, location, format_args!("{args}\n{trace}"));
        }
        self.shutdown()
    }

    fn shutdown(&self) -> ! {
        if let Err(err) = self.writer.close() {
            eprintln!("Failed to close logger '{}' before exiting: {}", self.name, err);
        }
        process::exit(FATAL_EXIT_CODE)
    }

    pub fn flush(&self) -> Result<(), LogError> {
        self.writer.flush()
    }

    pub fn close(&self) -> Result<(), LogError> {
        self.writer.close()
    }
}

/// Log at debug level: `debug!(logger, "listening on {}", addr)`.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::Logger::debug(&$logger, ::std::format_args!($($arg)+))
    };
}

/// Log at info level: `info!(logger, "listening on {}", addr)`.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::Logger::info(&$logger, ::std::format_args!($($arg)+))
    };
}

/// Log at warn level.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::Logger::warn(&$logger, ::std::format_args!($($arg)+))
    };
}

/// Log at error level.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::Logger::error(&$logger, ::std::format_args!($($arg)+))
    };
}

/// Log at fatal level and exit the process.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::Logger::fatal(&$logger, ::std::format_args!($($arg)+))
    };
}
