//! Runs in its own process because it installs a global logger before the blocking one.
use std::string::String;

use zynq7000_fsbl_bsp::log::blocking;

struct OtherLogger;

impl log::Log for OtherLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, _record: &log::Record) {}

    fn flush(&self) {}
}

static OTHER_LOGGER: OtherLogger = OtherLogger;

#[test]
fn init_fails_while_other_logger_is_installed() {
    log::set_logger(&OTHER_LOGGER).unwrap();

    let first = Box::leak(Box::new(String::new()));
    assert!(blocking::init_with_locks(first, log::LevelFilter::Info).is_err());
    assert!(!blocking::is_installed());

    let second = Box::leak(Box::new(String::new()));
    assert!(blocking::init_with_locks(second, log::LevelFilter::Info).is_err());
    assert!(!blocking::is_installed());
}
