//! Diagnostic output on stderr.
//!
//! Three output levels controlled by CLI flags:
//! - **Quiet** (`-q`): errors only
//! - **Default** (no flag): errors and warnings
//! - **Verbose** (`-v`): every table and record the decoder touches
//!
//! The level is installed as a [`log`] logger, so the `log::debug!` and
//! `log::trace!` records emitted by `hadron-srat` surface under `-v`.

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};

use log::{LevelFilter, Log, Metadata, Record};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Default = 1,
    Verbose = 2,
}

impl Verbosity {
    /// Most detailed log level shown at this verbosity.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::Error,
            Self::Default => LevelFilter::Warn,
            Self::Verbose => LevelFilter::Trace,
        }
    }
}

/// Global verbosity level, set once at startup.
static VERBOSITY: AtomicU8 = AtomicU8::new(1); // Default

static LOGGER: StderrLogger = StderrLogger;

/// Initialize the verbosity level and install the logger.
pub fn init(quiet: bool, verbose: bool) {
    let level = if quiet {
        Verbosity::Quiet
    } else if verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Default
    };
    VERBOSITY.store(level as u8, Ordering::Relaxed);
    // Fails only if a logger is already installed, which keeps the first.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level.level_filter());
    }
}

/// Returns the current verbosity level.
pub fn verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Default,
    }
}

/// Returns `true` if quiet mode is active.
pub fn is_quiet() -> bool {
    verbosity() == Verbosity::Quiet
}

/// Writes log records to stderr as `level: message`.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= verbosity().level_filter()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            let level = record.level().as_str().to_ascii_lowercase();
            let _ = writeln!(std::io::stderr().lock(), "{level}: {}", record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn levels_widen_with_verbosity() {
        assert!(Verbosity::Quiet < Verbosity::Default);
        assert_eq!(Verbosity::Quiet.level_filter(), LevelFilter::Error);
        assert!(Level::Warn <= Verbosity::Default.level_filter());
        assert!(Level::Debug > Verbosity::Default.level_filter());
        assert!(Level::Trace <= Verbosity::Verbose.level_filter());
    }
}
