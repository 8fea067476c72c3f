//! Global logger writing through the [`Console`] collaborator.

use crate::console::{print, Console};
use crate::sync::SpinLock;
use alloc::sync::Arc;
use lazy_static::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

lazy_static! {
    static ref LOG_CONSOLE: SpinLock<Option<Arc<dyn Console>>> = SpinLock::new(None);
}

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 34,  // Blue
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        // clone the sink so the lock is not held while the console writes
        let console = LOG_CONSOLE.lock().clone();
        if let Some(console) = console {
            print(
                console.as_ref(),
                format_args!(
                    "\u{1B}[{}m[{:>5}] {}\u{1B}[0m\n",
                    color,
                    record.level(),
                    record.args()
                ),
            );
        }
    }
    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger;

fn parse_level(level: Option<&str>) -> LevelFilter {
    match level {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") | None => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        Some("off") => LevelFilter::Off,
        Some(_) => LevelFilter::Info,
    }
}

/// Route log records to `console` at `level`.
///
/// May be called again to swap the sink; the logger itself is installed once.
pub fn init(console: Arc<dyn Console>, level: Option<&str>) {
    *LOG_CONSOLE.lock() = Some(console);
    // a second call finds the logger already set, which is fine
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(parse_level(level));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_strings() {
        assert_eq!(parse_level(Some("trace")), LevelFilter::Trace);
        assert_eq!(parse_level(Some("warn")), LevelFilter::Warn);
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("verbose")), LevelFilter::Info);
    }
}
