//! Low-level GPIO access module.
use embedded_hal::digital::PinState;
use zynq7000_fsbl_pac::gpio::{MaskedOutput, MmioGpio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOffset {
    Mio(usize),
    Emio(usize),
}

impl PinOffset {
    /// Returs [None] if offset is larger than 53.
    pub const fn new_for_mio(offset: usize) -> Option<Self> {
        if offset > 53 {
            return None;
        }
        Some(PinOffset::Mio(offset))
    }

    /// Returs [None] if offset is larger than 63.
    pub const fn new_for_emio(offset: usize) -> Option<Self> {
        if offset > 63 {
            return None;
        }
        Some(PinOffset::Emio(offset))
    }

    pub const fn is_mio(&self) -> bool {
        matches!(self, PinOffset::Mio(_))
    }

    pub const fn offset(&self) -> usize {
        match self {
            PinOffset::Mio(offset) => *offset,
            PinOffset::Emio(offset) => *offset,
        }
    }

    /// GPIO bank of the pin and its bit position inside that bank.
    ///
    /// Banks 0 and 1 hold the MIO pins, banks 2 and 3 the EMIO pins.
    pub const fn bank_and_local_offset(&self) -> (usize, usize) {
        match self {
            PinOffset::Mio(offset) => match *offset {
                0..=31 => (0, *offset),
                32..=53 => (1, *offset - 32),
                _ => panic!("invalid MIO pin offset"),
            },
            PinOffset::Emio(offset) => match *offset {
                0..=31 => (2, *offset),
                32..=63 => (3, *offset - 32),
                _ => panic!("invalid EMIO pin offset"),
            },
        }
    }
}

pub struct LowLevelGpio {
    offset: PinOffset,
    regs: MmioGpio<'static>,
}

impl LowLevelGpio {
    pub fn new(regs: MmioGpio<'static>, offset: PinOffset) -> Self {
        Self { offset, regs }
    }

    pub fn offset(&self) -> PinOffset {
        self.offset
    }

    /// Latch the initial level, then set the direction and output enable bits of the pin.
    ///
    /// The pin mux is not touched. The pin must already be routed to the GPIO controller.
    pub fn configure_as_output(&mut self, init_level: PinState) {
        self.write_state(init_level);
        self.enable_output_driver();
    }

    /// Set the direction and output enable bits without changing the output data bit.
    pub fn enable_output_driver(&mut self) {
        let (offset, dirm, outen) = self.dirm_outen_regs_and_local_offset();
        let mut curr_dirm = unsafe { core::ptr::read_volatile(dirm) };
        curr_dirm |= 1 << offset;
        unsafe { core::ptr::write_volatile(dirm, curr_dirm) };
        let mut curr_outen = unsafe { core::ptr::read_volatile(outen) };
        curr_outen |= 1 << offset;
        unsafe { core::ptr::write_volatile(outen, curr_outen) };
    }

    pub fn configure_as_input(&mut self) {
        let (offset, dirm, outen) = self.dirm_outen_regs_and_local_offset();
        let mut curr_dirm = unsafe { core::ptr::read_volatile(dirm) };
        curr_dirm &= !(1 << offset);
        unsafe { core::ptr::write_volatile(dirm, curr_dirm) };
        let mut curr_outen = unsafe { core::ptr::read_volatile(outen) };
        curr_outen &= !(1 << offset);
        unsafe { core::ptr::write_volatile(outen, curr_outen) };
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        let (offset, in_reg) = self.data_in_reg_and_local_offset();
        let in_val = unsafe { core::ptr::read_volatile(in_reg) };
        ((in_val >> offset) & 0b1) == 0
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        !self.is_low()
    }

    #[inline]
    pub fn is_set_low(&self) -> bool {
        let (offset, out_reg) = self.data_out_reg_and_local_offset();
        let out_val = unsafe { core::ptr::read_volatile(out_reg) };
        ((out_val >> offset) & 0b1) == 0
    }

    #[inline]
    pub fn is_set_high(&self) -> bool {
        !self.is_set_low()
    }

    #[inline]
    pub fn set_low(&mut self) {
        self.write_state(PinState::Low)
    }

    #[inline]
    pub fn set_high(&mut self) {
        self.write_state(PinState::High)
    }

    #[inline]
    pub fn write_state(&mut self, level: PinState) {
        let (offset_in_reg, masked_out_ptr) = self.masked_out_reg_and_local_offset();
        unsafe {
            core::ptr::write_volatile(
                masked_out_ptr,
                MaskedOutput::builder()
                    .with_mask(!(1 << offset_in_reg))
                    .with_output((level as u16) << offset_in_reg)
                    .build(),
            );
        }
    }

    #[inline(always)]
    fn data_in_reg_and_local_offset(&self) -> (usize, *mut u32) {
        let (bank, offset) = self.offset.bank_and_local_offset();
        let reg = match bank {
            0 => self.regs.pointer_to_in_0(),
            1 => self.regs.pointer_to_in_1(),
            2 => self.regs.pointer_to_in_2(),
            _ => self.regs.pointer_to_in_3(),
        };
        (offset, reg)
    }

    #[inline(always)]
    fn data_out_reg_and_local_offset(&self) -> (usize, *mut u32) {
        let (bank, offset) = self.offset.bank_and_local_offset();
        let reg = match bank {
            0 => self.regs.pointer_to_out_0(),
            1 => self.regs.pointer_to_out_1(),
            2 => self.regs.pointer_to_out_2(),
            _ => self.regs.pointer_to_out_3(),
        };
        (offset, reg)
    }

    #[inline(always)]
    fn dirm_outen_regs_and_local_offset(&self) -> (usize, *mut u32, *mut u32) {
        let (bank, offset) = self.offset.bank_and_local_offset();
        match bank {
            0 => (
                offset,
                self.regs.bank_0_shared().pointer_to_dirm(),
                self.regs.bank_0_shared().pointer_to_out_en(),
            ),
            1 => (
                offset,
                self.regs.bank_1_shared().pointer_to_dirm(),
                self.regs.bank_1_shared().pointer_to_out_en(),
            ),
            2 => (
                offset,
                self.regs.bank_2_shared().pointer_to_dirm(),
                self.regs.bank_2_shared().pointer_to_out_en(),
            ),
            _ => (
                offset,
                self.regs.bank_3_shared().pointer_to_dirm(),
                self.regs.bank_3_shared().pointer_to_out_en(),
            ),
        }
    }

    /// Each masked output register covers 16 pins of a bank.
    #[inline(always)]
    fn masked_out_reg_and_local_offset(&mut self) -> (usize, *mut MaskedOutput) {
        let (bank, offset) = self.offset.bank_and_local_offset();
        let upper_half = offset >= 16;
        let reg = match (bank, upper_half) {
            (0, false) => self.regs.pointer_to_masked_out_0_lsw(),
            (0, true) => self.regs.pointer_to_masked_out_0_msw(),
            (1, false) => self.regs.pointer_to_masked_out_1_lsw(),
            (1, true) => self.regs.pointer_to_masked_out_1_msw(),
            (2, false) => self.regs.pointer_to_masked_out_2_lsw(),
            (2, true) => self.regs.pointer_to_masked_out_2_msw(),
            (_, false) => self.regs.pointer_to_masked_out_3_lsw(),
            (_, true) => self.regs.pointer_to_masked_out_3_msw(),
        };
        (offset % 16, reg)
    }
}
