use std::fmt;

/// Minimum severity a diagnostic must reach before it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Warning,
    Error,
}

/// Severity-gated diagnostic sink threaded through parsing via `ParseContext`.
///
/// Default construction prints to stderr; `Logger::silent` and
/// `Logger::with_sink` let callers embedding this reader in a larger service
/// redirect or suppress output instead of having it written directly from deep
/// inside the metadata decoder.
pub struct Logger {
    level: LogLevel,
    sink: Box<dyn FnMut(LogLevel, &str) + Send>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("level", &self.level).finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

impl Logger {
    #[must_use]
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            sink: Box::new(|level, message| eprintln!("[{level:?}] {message}")),
        }
    }

    /// Builds a logger that discards every message below `Error`'s threshold
    /// plus one above it, i.e. drops everything.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            level: LogLevel::Error,
            sink: Box::new(|_, _| {}),
        }
    }

    #[must_use]
    pub fn with_sink(level: LogLevel, sink: impl FnMut(LogLevel, &str) + Send + 'static) -> Self {
        Self {
            level,
            sink: Box::new(sink),
        }
    }

    fn log(&mut self, level: LogLevel, message: fmt::Arguments<'_>) {
        if level >= self.level {
            (self.sink)(level, &message.to_string());
        }
    }

    pub fn debug(&mut self, message: fmt::Arguments<'_>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warning(&mut self, message: fmt::Arguments<'_>) {
        self.log(LogLevel::Warning, message);
    }
}
