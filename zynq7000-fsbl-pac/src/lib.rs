//! # Register access for the Zynq7000 FSBL peripherals
//!
//! This crate only covers the two processing system peripherals which the first-stage boot
//! loader drives directly: the QSPI flash controller and the GPIO controller.
#![no_std]

use core::sync::atomic::{AtomicBool, Ordering};

pub mod gpio;
pub mod qspi;

static PERIPHERALS_TAKEN: AtomicBool = AtomicBool::new(false);

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum SpiClockPhase {
    ActiveOutsideOfWord = 0,
    InactiveOutsideOfWord = 1,
}

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum SpiClockPolarity {
    QuiescentLow = 0,
    QuiescentHigh = 1,
}

/// Peripheral singleton for the register blocks of this crate.
pub struct Peripherals {
    pub qspi: qspi::MmioQspi<'static>,
    pub gpio: gpio::MmioGpio<'static>,
}

impl Peripherals {
    /// Returns all supported processing system peripherals **once**.
    pub fn take() -> Option<Self> {
        let taken = PERIPHERALS_TAKEN.swap(true, Ordering::Relaxed);
        if taken {
            return None;
        }
        Some(unsafe { Self::steal() })
    }

    /// Unchecked version of [Self::take].
    ///
    /// # Safety
    ///
    /// Each of the returned peripherals must be used at most once.
    pub unsafe fn steal() -> Self {
        unsafe {
            Self {
                qspi: qspi::Qspi::new_mmio_fixed(),
                gpio: gpio::Gpio::new_mmio_fixed(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peripherals_taken_once() {
        assert!(Peripherals::take().is_some());
        assert!(Peripherals::take().is_none());
    }
}
