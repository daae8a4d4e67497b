#![deny(missing_docs)]
//! Shared logging utilities for the pagefix workspace.
//!
//! This crate provides the `pagefix_*` logging macros used across the codebase,
//! a thread-local page clock that prefixes every message with the host page's
//! virtual time, and a minimal test initializer for the global logger.

use std::cell::{Cell, RefCell};
use std::sync::Once;

use log::Log;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

/// Prefix attached to every diagnostic line emitted through the macros.
pub const LOG_PREFIX: &str = "[pagefix]";

thread_local! {
    /// Thread-local storage for the host page clock, in milliseconds.
    static PAGE_TIME_MS: Cell<u64> = const { Cell::new(0) };
    /// Records collected by [`capture_records`] on this thread, if active.
    static CAPTURED: RefCell<Option<Vec<CapturedRecord>>> = const { RefCell::new(None) };
}

/// Sets the page clock for the current thread.
/// The event loop calls this whenever the host page advances its clock.
pub fn set_page_time_ms(ms: u64) {
    PAGE_TIME_MS.with(|v| v.set(ms));
}

/// Retrieves the page clock for the current thread.
/// Returns 0 if the clock has not been set.
pub fn page_time_ms() -> u64 {
    PAGE_TIME_MS.with(|v| v.get())
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! pagefix_trace {
    ($($arg:tt)*) => {{
        log::trace!("{} t+{}ms {}", $crate::LOG_PREFIX, $crate::page_time_ms(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! pagefix_info {
    ($($arg:tt)*) => {{
        log::info!("{} t+{}ms {}", $crate::LOG_PREFIX, $crate::page_time_ms(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! pagefix_debug {
    ($($arg:tt)*) => {{
        log::debug!("{} t+{}ms {}", $crate::LOG_PREFIX, $crate::page_time_ms(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! pagefix_warn {
    ($($arg:tt)*) => {{
        log::warn!("{} t+{}ms {}", $crate::LOG_PREFIX, $crate::page_time_ms(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! pagefix_error {
    ($($arg:tt)*) => {{
        log::error!("{} t+{}ms {}", $crate::LOG_PREFIX, $crate::page_time_ms(), format_args!($($arg)*));
    }};
}

/// A log record seen on the current thread while [`capture_records`] ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    /// Severity of the record.
    pub level: log::Level,
    /// Formatted message, including the prefix and page time.
    pub message: String,
}

/// Terminal logger that also copies records into the thread's capture buffer.
struct TestLogger {
    inner: Box<TermLogger>,
}

impl Log for TestLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with(|captured| {
            if let Some(records) = captured.borrow_mut().as_mut() {
                records.push(CapturedRecord {
                    level: record.level(),
                    message: record.args().to_string(),
                });
            }
        });
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // Use debug level in debug builds, info in release builds.
        let level = if cfg!(debug_assertions) {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        let logger = TestLogger {
            inner: TermLogger::new(
                level,
                Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            ),
        };
        // Ignore the error if a logger was already set elsewhere.
        if log::set_boxed_logger(Box::new(logger)).is_ok() {
            log::set_max_level(level);
        }
    });
}

/// Runs `f` and returns the records it logged on the current thread.
///
/// Only records that pass the logger installed by [`initialize_for_tests`]
/// are seen; call that first.
pub fn capture_records<T>(f: impl FnOnce() -> T) -> (T, Vec<CapturedRecord>) {
    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    let value = f();
    let records = CAPTURED
        .with(|captured| captured.borrow_mut().take())
        .unwrap_or_default();
    (value, records)
}

#[cfg(test)]
mod tests {
    use super::{capture_records, initialize_for_tests, page_time_ms, set_page_time_ms};

    #[test]
    fn page_clock_is_thread_local() {
        set_page_time_ms(1_250);
        assert_eq!(page_time_ms(), 1_250);

        let other = std::thread::spawn(page_time_ms).join().unwrap();
        assert_eq!(other, 0);
    }

    #[test]
    fn records_are_captured_per_thread() {
        initialize_for_tests();
        set_page_time_ms(40);
        let ((), records) = capture_records(|| {
            crate::pagefix_warn!("banner gone");
            std::thread::spawn(|| crate::pagefix_warn!("elsewhere"))
                .join()
                .unwrap();
        });

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, log::Level::Warn);
        assert_eq!(records[0].message, "[pagefix] t+40ms banner gone");

        let ((), after) = capture_records(|| ());
        assert!(after.is_empty());
    }
}
