//! # Simple logging providers
//!
//! The boot loader writes its log output to whatever character sink is available, usually a
//! polled UART. Any [core::fmt::Write] implementation can be used.
use core::sync::atomic::{AtomicBool, Ordering};

static LOGGER_INIT_DONE: AtomicBool = AtomicBool::new(false);

/// Blocking loggers.
pub mod blocking {
    use super::*;
    use core::cell::RefCell;
    use core::fmt::Write;

    use critical_section::Mutex;
    use log::{LevelFilter, SetLoggerError, set_logger, set_max_level};

    type Sink = &'static mut (dyn Write + Send);

    pub struct BlockingLogger(Mutex<RefCell<Option<Sink>>>);

    static BLOCKING_LOGGER: BlockingLogger = BlockingLogger(Mutex::new(RefCell::new(None)));

    /// Initialize the global logger with a blocking character sink.
    ///
    /// The write is performed inside a critical section. Calling this function again after a
    /// successful initialization only adjusts the maximum log level and drops the new sink.
    /// If a different logger is already installed, the sink is dropped and an error is
    /// returned on every call.
    pub fn init_with_locks(sink: Sink, level: LevelFilter) -> Result<(), SetLoggerError> {
        critical_section::with(|cs| {
            if LOGGER_INIT_DONE.load(Ordering::Relaxed) {
                return Ok(());
            }
            BLOCKING_LOGGER.0.borrow(cs).replace(Some(sink));
            if let Err(e) = set_logger(&BLOCKING_LOGGER) {
                BLOCKING_LOGGER.0.borrow(cs).replace(None);
                return Err(e);
            }
            LOGGER_INIT_DONE.store(true, Ordering::Relaxed);
            Ok(())
        })?;
        set_max_level(level);
        Ok(())
    }

    /// Whether [init_with_locks] installed the blocking logger.
    pub fn is_installed() -> bool {
        LOGGER_INIT_DONE.load(Ordering::Relaxed)
    }

    /// Flush the installed logger.
    pub fn flush() {
        log::logger().flush();
    }

    impl log::Log for BlockingLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            critical_section::with(|cs| {
                let mut opt_sink = self.0.borrow(cs).borrow_mut();
                if let Some(sink) = opt_sink.as_mut() {
                    // There is nowhere to report a failing log sink to.
                    let _ = write!(sink, "{} - {}\r\n", record.level(), record.args());
                }
            })
        }

        // Writes are not buffered.
        fn flush(&self) {}
    }
}
