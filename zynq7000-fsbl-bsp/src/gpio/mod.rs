//! # GPIO module
//!
//! Polled GPIO pins and the boot status LED.
//!
//! The pin mux is expected to be configured by the boot ROM or the PS7 init code. This module
//! only touches the GPIO controller registers.
use core::convert::Infallible;

pub use embedded_hal::digital::PinState;
use embedded_hal::digital::{OutputPin, StatefulOutputPin};
use zynq7000_fsbl_pac::gpio::MmioGpio;

pub mod ll;

pub use ll::{LowLevelGpio, PinOffset};

/// MIO pin of the status LED on the ZedBoard style carrier.
pub const ZEDBOARD_LED_PIN: PinOffset = match PinOffset::new_for_mio(39) {
    Some(pin) => pin,
    None => panic!("invalid LED pin"),
};

/// Push-pull output pin.
pub struct Output(LowLevelGpio);

impl Output {
    pub fn new(regs: MmioGpio<'static>, offset: PinOffset, init_level: PinState) -> Self {
        let mut low_level = LowLevelGpio::new(regs, offset);
        low_level.configure_as_output(init_level);
        Self(low_level)
    }

    #[inline]
    pub fn set_low(&mut self) {
        self.0.set_low();
    }

    #[inline]
    pub fn set_high(&mut self) {
        self.0.set_high();
    }

    pub fn offset(&self) -> PinOffset {
        self.0.offset()
    }
}

impl embedded_hal::digital::ErrorType for Output {
    type Error = Infallible;
}

impl OutputPin for Output {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_high();
        Ok(())
    }
}

impl StatefulOutputPin for Output {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_set_high())
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_set_low())
    }
}

/// Input pin.
pub struct Input(LowLevelGpio);

impl Input {
    pub fn new(regs: MmioGpio<'static>, offset: PinOffset) -> Self {
        let mut low_level = LowLevelGpio::new(regs, offset);
        low_level.configure_as_input();
        Self(low_level)
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.0.is_high()
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        self.0.is_low()
    }
}

impl embedded_hal::digital::ErrorType for Input {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for Input {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_low())
    }
}

/// Active-low status LED.
///
/// The LED is lit when the pin is driven low.
pub struct StatusLed<P> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> StatusLed<P> {
    /// Wrap an already configured pin and switch the LED off.
    pub fn new(mut pin: P) -> Result<Self, P::Error> {
        pin.set_high()?;
        Ok(Self { pin, lit: false })
    }

    pub fn on(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.lit = true;
        Ok(())
    }

    pub fn off(&mut self) -> Result<(), P::Error> {
        self.pin.set_high()?;
        self.lit = false;
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<(), P::Error> {
        if self.lit { self.off() } else { self.on() }
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.lit
    }

    pub fn release(self) -> P {
        self.pin
    }
}

/// Configure [ZEDBOARD_LED_PIN] as an output and switch the LED off.
pub fn init_status_led(regs: MmioGpio<'static>) -> StatusLed<Output> {
    let pin = Output::new(regs, ZEDBOARD_LED_PIN, PinState::High);
    log::debug!("status LED on MIO {} configured", ZEDBOARD_LED_PIN.offset());
    StatusLed { pin, lit: false }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::boxed::Box;
    use std::vec::Vec;
    use zynq7000_fsbl_pac::gpio::Gpio;

    const REG_WORDS: usize = 0x2E8 / 4;
    const MASKED_OUT_1_LSW: usize = 0x08 / 4;
    const IN_1: usize = 0x64 / 4;
    const BANK_1_DIRM: usize = 0x244 / 4;
    const BANK_1_OUT_EN: usize = 0x248 / 4;

    fn fake_gpio() -> (*mut u32, MmioGpio<'static>) {
        let mem: *mut u32 = Box::leak(Box::new([0u32; REG_WORDS])).as_mut_ptr();
        let regs = unsafe { Gpio::new_mmio_at(mem as usize) };
        (mem, regs)
    }

    fn peek(mem: *mut u32, idx: usize) -> u32 {
        unsafe { core::ptr::read_volatile(mem.add(idx)) }
    }

    fn poke(mem: *mut u32, idx: usize, val: u32) {
        unsafe { core::ptr::write_volatile(mem.add(idx), val) }
    }

    #[derive(Default)]
    struct RecordingPin {
        levels: Vec<PinState>,
    }

    impl embedded_hal::digital::ErrorType for RecordingPin {
        type Error = Infallible;
    }

    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.levels.push(PinState::Low);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.levels.push(PinState::High);
            Ok(())
        }
    }

    #[test]
    fn led_init_configures_direction_and_output_enable() {
        let (mem, regs) = fake_gpio();
        poke(mem, BANK_1_DIRM, 0x40);
        let led = init_status_led(regs);
        assert!(!led.is_on());
        assert_eq!(peek(mem, BANK_1_DIRM), 0xC0);
        assert_eq!(peek(mem, BANK_1_OUT_EN), 0x80);
        assert_eq!(peek(mem, MASKED_OUT_1_LSW), 0xFF7F_0080);
    }

    #[test]
    fn led_on_off_masked_writes() {
        let (mem, regs) = fake_gpio();
        let mut led = init_status_led(regs);
        led.on().unwrap();
        assert!(led.is_on());
        assert_eq!(peek(mem, MASKED_OUT_1_LSW), 0xFF7F_0000);
        led.off().unwrap();
        assert!(!led.is_on());
        assert_eq!(peek(mem, MASKED_OUT_1_LSW), 0xFF7F_0080);
        led.toggle().unwrap();
        assert_eq!(peek(mem, MASKED_OUT_1_LSW), 0xFF7F_0000);
    }

    #[test]
    fn upper_half_pin_uses_msw_register() {
        let (mem, regs) = fake_gpio();
        let mut out = Output::new(regs, PinOffset::Mio(50), PinState::Low);
        assert_eq!(peek(mem, 0x0C / 4), 0xFFFB_0000);
        out.set_high();
        assert_eq!(peek(mem, 0x0C / 4), 0xFFFB_0004);
        assert_eq!(peek(mem, BANK_1_DIRM), 1 << 18);
    }

    #[test]
    fn input_reads_data_register() {
        let (mem, regs) = fake_gpio();
        poke(mem, BANK_1_DIRM, 0xFF);
        let input = Input::new(regs, PinOffset::Mio(39));
        assert_eq!(peek(mem, BANK_1_DIRM), 0x7F);
        assert!(input.is_low());
        poke(mem, IN_1, 1 << 7);
        assert!(input.is_high());
    }

    #[test]
    fn status_led_is_active_low() {
        let mut led = StatusLed::new(RecordingPin::default()).unwrap();
        assert!(!led.is_on());
        led.on().unwrap();
        led.toggle().unwrap();
        led.toggle().unwrap();
        assert!(led.is_on());
        let pin = led.release();
        assert_eq!(
            pin.levels,
            [PinState::High, PinState::Low, PinState::High, PinState::Low]
        );
    }
}
