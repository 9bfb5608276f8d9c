//! # GPIO register module.
pub const GPIO_BASE_ADDR: usize = 0xE000_A000;

/// Maskable output data register covering one half of a bank.
///
/// A pin is only updated if its bit in the mask half is 0.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct MaskedOutput {
    #[bits(16..=31, w)]
    mask: u16,
    #[bits(0..=15, rw)]
    output: u16,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct BankControl {
    /// Direction mode, 1 is output.
    dirm: u32,
    /// Output enable.
    out_en: u32,
    #[mmio(PureRead)]
    int_mask: u32,
    #[mmio(Write)]
    int_en: u32,
    #[mmio(Write)]
    int_dis: u32,
    #[mmio(PureRead, Write)]
    int_sts: u32,
    int_type: u32,
    int_pol: u32,
    int_any: u32,
}

/// GPIO controller register block.
///
/// Banks 0 and 1 are routed to MIO pins 0..=31 and 32..=53, banks 2 and 3 to the EMIO.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Gpio {
    masked_out_0_lsw: MaskedOutput,
    masked_out_0_msw: MaskedOutput,
    masked_out_1_lsw: MaskedOutput,
    masked_out_1_msw: MaskedOutput,
    masked_out_2_lsw: MaskedOutput,
    masked_out_2_msw: MaskedOutput,
    masked_out_3_lsw: MaskedOutput,
    masked_out_3_msw: MaskedOutput,

    _reserved_0: [u32; 8],

    out_0: u32,
    out_1: u32,
    out_2: u32,
    out_3: u32,

    _reserved_1: [u32; 4],

    #[mmio(PureRead)]
    in_0: u32,
    #[mmio(PureRead)]
    in_1: u32,
    #[mmio(PureRead)]
    in_2: u32,
    #[mmio(PureRead)]
    in_3: u32,

    _reserved_2: [u32; 101],

    #[mmio(Inner)]
    bank_0: BankControl,

    _reserved_3: [u32; 7],

    #[mmio(Inner)]
    bank_1: BankControl,

    _reserved_4: [u32; 7],

    #[mmio(Inner)]
    bank_2: BankControl,

    _reserved_5: [u32; 7],

    #[mmio(Inner)]
    bank_3: BankControl,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Gpio>(), 0x2E8);

impl Gpio {
    /// Create a new MMIO instance for the GPIO controller at [GPIO_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    pub const unsafe fn new_mmio_fixed() -> MmioGpio<'static> {
        unsafe { Self::new_mmio_at(GPIO_BASE_ADDR) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_offsets() {
        assert_eq!(core::mem::offset_of!(Gpio, masked_out_1_lsw), 0x08);
        assert_eq!(core::mem::offset_of!(Gpio, in_0), 0x60);
        assert_eq!(core::mem::offset_of!(Gpio, bank_0), 0x204);
        assert_eq!(core::mem::offset_of!(Gpio, bank_1), 0x244);
        assert_eq!(core::mem::offset_of!(Gpio, bank_3), 0x2C4);
    }

    #[test]
    fn masked_write_value() {
        let val = MaskedOutput::builder()
            .with_mask(!(1 << 7))
            .with_output(1 << 7)
            .build();
        assert_eq!(val.raw_value(), 0xFF7F_0080);
    }
}
