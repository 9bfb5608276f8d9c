//! # Board support for a Zynq7000 first-stage boot loader
//!
//! Drivers used by the boot loader before the application image is loaded:
//!
//! - [qspi]: QSPI flash controller in polled I/O mode.
//! - [qspi_spansion]: Spansion S25FL command protocol, mainly the configuration register
//!   setup for quad I/O.
//! - [gpio]: polled GPIO pins and the boot status LED.
//! - [dbg]: debug print and instrumentation macros on top of the `log` facade.
//! - [mod@log]: a blocking logger for any character sink.
#![no_std]

pub mod dbg;
pub mod gpio;
pub mod log;
pub mod qspi;
pub mod qspi_spansion;

pub use zynq7000_fsbl_pac as pac;
