//! QSPI flash controller register module.
use arbitrary_int::{u2, u3};

pub use crate::{SpiClockPhase, SpiClockPolarity};

pub const QSPI_BASE_ADDR: usize = 0xE000_D000;
/// Start of the memory mapped flash window when the controller runs in linear mode.
pub const LINEAR_FLASH_BASE_ADDR: usize = 0xFC00_0000;

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum InterfaceMode {
    LegacySpi = 0,
    FlashMemoryInterface = 1,
}

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum Endianness {
    Little = 0,
    Big = 1,
}

/// Divisor applied to the QSPI reference clock to generate the interface clock.
#[bitbybit::bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum BaudRateDivisor {
    _2 = 0b000,
    _4 = 0b001,
    _8 = 0b010,
    _16 = 0b011,
    _32 = 0b100,
    _64 = 0b101,
    _128 = 0b110,
    _256 = 0b111,
}

impl BaudRateDivisor {
    pub const fn divisor(&self) -> u32 {
        match self {
            BaudRateDivisor::_2 => 2,
            BaudRateDivisor::_4 => 4,
            BaudRateDivisor::_8 => 8,
            BaudRateDivisor::_16 => 16,
            BaudRateDivisor::_32 => 32,
            BaudRateDivisor::_64 => 64,
            BaudRateDivisor::_128 => 128,
            BaudRateDivisor::_256 => 256,
        }
    }
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Config {
    #[bit(31, rw)]
    interface_mode: InterfaceMode,
    #[bit(26, rw)]
    endianness: Endianness,
    #[bit(19, rw)]
    holdb_dr: bool,
    /// Self-clearing in hardware.
    #[bit(16, w)]
    manual_start_command: bool,
    #[bit(15, rw)]
    manual_start_enable: bool,
    #[bit(14, rw)]
    manual_cs: bool,
    /// Drives the chip select line when it is controlled manually. The line is active low, so
    /// setting this bit de-asserts the chip select.
    #[bit(10, rw)]
    peripheral_chip_select: bool,
    /// Only 0b11 (32 bits) is valid.
    #[bits(6..=7, rw)]
    fifo_width: u2,
    #[bits(3..=5, rw)]
    baud_rate_div: BaudRateDivisor,
    #[bit(2, rw)]
    clock_phase: SpiClockPhase,
    #[bit(1, rw)]
    clock_polarity: SpiClockPolarity,
    /// Master mode. 0 is reserved.
    #[bit(0, rw)]
    mode_select: bool,
}

#[bitbybit::bitfield(u32, debug)]
pub struct InterruptStatus {
    /// Write-to-clear.
    #[bit(6, rw)]
    tx_underflow: bool,
    #[bit(5, r)]
    rx_full: bool,
    /// RX FIFO fill level is at or above the RX threshold. With a threshold of 1, this is the
    /// "RX not empty" flag.
    #[bit(4, r)]
    rx_not_empty: bool,
    #[bit(3, r)]
    tx_full: bool,
    /// TX FIFO fill level is below the TX threshold.
    #[bit(2, r)]
    tx_not_full: bool,
    /// Write-to-clear.
    #[bit(0, rw)]
    rx_overrun: bool,
}

#[bitbybit::bitfield(u32)]
pub struct InterruptControl {
    #[bit(6, w)]
    tx_underflow: bool,
    #[bit(5, w)]
    rx_full: bool,
    #[bit(4, w)]
    rx_not_empty: bool,
    #[bit(3, w)]
    tx_full: bool,
    #[bit(2, w)]
    tx_not_full: bool,
    #[bit(0, w)]
    rx_overrun: bool,
}

#[bitbybit::bitfield(u32, debug)]
pub struct InterruptMask {
    #[bit(6, r)]
    tx_underflow: bool,
    #[bit(5, r)]
    rx_full: bool,
    #[bit(4, r)]
    rx_not_empty: bool,
    #[bit(3, r)]
    tx_full: bool,
    #[bit(2, r)]
    tx_not_full: bool,
    #[bit(0, r)]
    rx_overrun: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct SpiEnable {
    #[bit(0, rw)]
    enable: bool,
}

/// Delays in reference clock cycles.
#[bitbybit::bitfield(u32, debug)]
pub struct Delay {
    #[bits(24..=31, rw)]
    deassert: u8,
    #[bits(16..=23, rw)]
    between: u8,
    #[bits(8..=15, rw)]
    after: u8,
    #[bits(0..=7, rw)]
    init: u8,
}

#[bitbybit::bitfield(u32, debug)]
pub struct Gpio {
    /// Active low write-protect output.
    #[bit(0, rw)]
    write_protect_n: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct LoopbackMasterClockDelay {
    /// Required when the baud rate divisor is 2.
    #[bit(5, rw)]
    use_loopback: bool,
    #[bits(3..=4, rw)]
    delay_1: u2,
    #[bits(0..=2, rw)]
    delay_0: u3,
}

#[bitbybit::bitenum(u8, exhaustive = false)]
#[derive(Debug, PartialEq, Eq)]
pub enum InstructionCode {
    Read = 0x03,
    FastRead = 0x0B,
    FastReadDualOutput = 0x3B,
    FastReadQuadOutput = 0x6B,
    FastReadDualIo = 0xBB,
    FastReadQuadIo = 0xEB,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct LinearQspiConfig {
    #[bit(31, rw)]
    enable_linear_mode: bool,
    #[bit(30, rw)]
    both_memories: bool,
    /// Only relevant if both memories are used.
    #[bit(29, rw)]
    separate_memory_bus: bool,
    /// In I/O mode, selects the upper memory of a stacked configuration.
    #[bit(28, rw)]
    upper_memory_page: bool,
    #[bit(25, rw)]
    mode_enable: bool,
    #[bit(24, rw)]
    mode_on: bool,
    #[bits(16..=23, rw)]
    mode_bits: u8,
    #[bits(8..=10, rw)]
    num_dummy_bytes: u3,
    #[bits(0..=7, rw)]
    instruction_code: Option<InstructionCode>,
}

#[bitbybit::bitfield(u32, debug)]
pub struct LinearQspiStatus {
    #[bit(2, rw)]
    data_fsm_error: bool,
    #[bit(1, rw)]
    axi_write_command_received: bool,
}

/// QSPI controller register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Qspi {
    config: Config,
    interrupt_status: InterruptStatus,
    #[mmio(Write)]
    interrupt_enable: InterruptControl,
    #[mmio(Write)]
    interrupt_disable: InterruptControl,
    #[mmio(PureRead)]
    interrupt_mask: InterruptMask,
    spi_enable: SpiEnable,
    delay: Delay,
    /// TXD0: 1-byte instruction and 3 data bytes, or 4 data bytes.
    #[mmio(Write)]
    tx_data_00: u32,
    /// Reading pops one word from the RX FIFO.
    #[mmio(PureRead)]
    rx_data: u32,
    slave_idle_count: u32,
    /// Level at which the TX FIFO not full flag is generated.
    tx_fifo_threshold: u32,
    /// Level at which the RX FIFO not empty flag is generated.
    rx_fifo_threshold: u32,
    gpio: Gpio,
    _reserved0: u32,
    loopback_master_clock_delay: LoopbackMasterClockDelay,
    _reserved1: [u32; 0x11],
    /// TXD1: 1-byte instruction.
    #[mmio(Write)]
    tx_data_01: u32,
    /// TXD2: 1-byte instruction and 1 data byte.
    #[mmio(Write)]
    tx_data_10: u32,
    /// TXD3: 1-byte instruction and 2 data bytes.
    #[mmio(Write)]
    tx_data_11: u32,
    _reserved2: [u32; 0x5],
    linear_qspi_config: LinearQspiConfig,
    linear_qspi_status: LinearQspiStatus,
    _reserved3: [u32; 0x15],
    /// Reset value 0x0109_0101.
    #[mmio(PureRead)]
    module_id: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Qspi>(), 0x100);

impl Qspi {
    /// Create a new MMIO instance for the QSPI controller at [QSPI_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    pub const unsafe fn new_mmio_fixed() -> MmioQspi<'static> {
        unsafe { Self::new_mmio_at(QSPI_BASE_ADDR) }
    }
}
