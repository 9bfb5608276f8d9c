//! # Spansion S25FL QSPI flash support
//!
//! Register level command protocol for the Spansion S25FL-S family. The main task of this
//! module during boot is configuring the flash configuration register: enabling quad I/O and
//! selecting the read latency code.
use arbitrary_int::{u2, u3};
use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::qspi::{FifoError, FifoStatusCheck, PolledTransfer, TransferError};

pub const DEFAULT_WRITE_POLL_LIMIT: u32 = 1_000_000;

/// Manufacturer ID returned by RDID for Spansion devices.
pub const MANUFACTURER_ID_SPANSION: u8 = 0x01;

/// QUAD bit of the configuration register.
pub const CR1_QUAD: u8 = 0x02;
/// Both latency code bits of the configuration register.
pub const CR1_LATENCY_CODE: u8 = 0xC0;
/// TBPROT, BPNV and TBPARM. Once set, these bits can not be cleared anymore.
pub const CR1_OTP_BITS: u8 = 0x2C;
/// SRWD and block protection bits. All other status register 1 bits are read-only.
const SR1_WRITABLE_BITS: u8 = 0x9C;

/// Settle time after showing all status registers.
const STATUS_SETTLE_DELAY_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterId {
    /// WRR
    WriteRegisters = 0x01,
    /// WRDI
    WriteDisable = 0x04,
    /// RDSR1
    ReadStatus1 = 0x05,
    /// WREN
    WriteEnable = 0x06,
    /// RDSR2
    ReadStatus2 = 0x07,
    /// ABRD
    AutoBootRead = 0x14,
    /// BRRD
    BankRead = 0x16,
    /// ASPRD
    AspRead = 0x2B,
    /// CLSR
    ClearStatus = 0x30,
    /// RDCR
    ReadConfig = 0x35,
    /// RDID
    ReadId = 0x9F,
    /// RESET
    SoftwareReset = 0xF0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum MemoryInterfaceType {
    _128Mb = 0x20,
    _256MbAndLarger = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum Density {
    _128Mb = 0x18,
    _256Mb = 0x19,
    _512Mb = 0x20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseDeviceId {
    manufacturer_id: u8,
    device_id: u16,
}

impl BaseDeviceId {
    #[inline]
    pub const fn new(manufacturer_id: u8, device_id: u16) -> Self {
        BaseDeviceId {
            manufacturer_id,
            device_id,
        }
    }

    #[inline]
    pub const fn from_raw(raw: &[u8; 3]) -> Self {
        BaseDeviceId::new(raw[0], ((raw[1] as u16) << 8) | raw[2] as u16)
    }

    #[inline]
    pub const fn manufacturer_id(&self) -> u8 {
        self.manufacturer_id
    }

    #[inline]
    pub const fn device_id_raw(&self) -> u16 {
        self.device_id
    }

    #[inline]
    pub const fn is_spansion(&self) -> bool {
        self.manufacturer_id == MANUFACTURER_ID_SPANSION
    }

    #[inline]
    pub fn memory_interface_type(&self) -> Result<MemoryInterfaceType, u8> {
        MemoryInterfaceType::try_from(((self.device_id >> 8) & 0xff) as u8).map_err(|e| e.number)
    }

    #[inline]
    pub fn density(&self) -> Result<Density, u8> {
        Density::try_from((self.device_id & 0xff) as u8).map_err(|e| e.number)
    }
}

#[bitbybit::bitfield(u8)]
#[derive(Debug, PartialEq, Eq)]
pub struct StatusRegister1 {
    #[bit(7, rw)]
    status_register_write_disable: bool,
    #[bit(6, r)]
    programming_error: bool,
    #[bit(5, r)]
    erase_error: bool,
    #[bits(2..=4, rw)]
    block_protection: u3,
    #[bit(1, r)]
    write_enable_latch: bool,
    #[bit(0, r)]
    write_in_progress: bool,
}

#[bitbybit::bitfield(u8)]
#[derive(Debug, PartialEq, Eq)]
pub struct StatusRegister2 {
    #[bit(1, r)]
    erase_suspend: bool,
    #[bit(0, r)]
    program_suspend: bool,
}

#[bitbybit::bitfield(u8)]
#[derive(Debug, PartialEq, Eq)]
pub struct ConfigRegister1 {
    #[bits(6..=7, rw)]
    latency_code: u2,
    /// This is an OTP bit. It can not be set back to 0 once it has been set to 1!
    #[bit(5, rw)]
    tbprot: bool,
    /// This is an OTP bit. It can not be set back to 0 once it has been set to 1!
    #[bit(3, rw)]
    bpnv: bool,
    /// This is an OTP bit. It can not be set back to 0 once it has been set to 1!
    #[bit(2, rw)]
    tbparm: bool,
    #[bit(1, rw)]
    quad: bool,
    #[bit(0, rw)]
    freeze: bool,
}

#[bitbybit::bitfield(u8)]
#[derive(Debug, PartialEq, Eq)]
pub struct BankAddressRegister {
    /// 4-byte addressing for all commands.
    #[bit(7, rw)]
    extended_address: bool,
    /// Upper address bits A25..A24 for 3-byte address commands.
    #[bits(0..=1, rw)]
    bank_address: u2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of status register polls while waiting for a register write to finish.
    pub write_poll_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_poll_limit: DEFAULT_WRITE_POLL_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("QSPI transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("register write still in progress after {polls} status polls")]
    WriteTimeout { polls: u32 },
    #[error("programming error bit set in status register")]
    ProgramError,
    #[error("configuration register is {actual:#04x}, expected {expected:#04x}")]
    ConfigMismatch { expected: u8, actual: u8 },
    #[error("QSPI FIFO error: {0}")]
    Fifo(#[from] FifoError),
}

/// Spansion S25FL flash attached to a QSPI controller in I/O mode.
pub struct SpansionFlash<Q> {
    qspi: Q,
    config: Config,
}

impl<Q: PolledTransfer> SpansionFlash<Q> {
    pub fn new(qspi: Q, config: Config) -> Self {
        Self { qspi, config }
    }

    #[inline]
    pub fn qspi_mut(&mut self) -> &mut Q {
        &mut self.qspi
    }

    pub fn release(self) -> Q {
        self.qspi
    }

    fn command(&mut self, id: RegisterId) -> Result<(), Error> {
        self.qspi.polled_transfer(&[id as u8], None)?;
        Ok(())
    }

    /// Send a read command and fill `data` with the bytes following the instruction.
    fn read_register(&mut self, id: RegisterId, data: &mut [u8]) -> Result<(), Error> {
        let mut tx = [0; 5];
        let mut rx = [0; 5];
        let len = data.len() + 1;
        tx[0] = id as u8;
        self.qspi.polled_transfer(&tx[..len], Some(&mut rx[..len]))?;
        data.copy_from_slice(&rx[1..len]);
        Ok(())
    }

    fn read_register_byte(&mut self, id: RegisterId) -> Result<u8, Error> {
        let mut data = [0; 1];
        self.read_register(id, &mut data)?;
        Ok(data[0])
    }

    pub fn write_enable(&mut self) -> Result<(), Error> {
        self.command(RegisterId::WriteEnable)
    }

    pub fn write_disable(&mut self) -> Result<(), Error> {
        self.command(RegisterId::WriteDisable)
    }

    /// Clear the programming and erase error bits of status register 1.
    pub fn clear_status(&mut self) -> Result<(), Error> {
        self.command(RegisterId::ClearStatus)
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        self.command(RegisterId::SoftwareReset)?;
        info!("QSPI flash software reset");
        Ok(())
    }

    pub fn read_status_register_1(&mut self) -> Result<StatusRegister1, Error> {
        Ok(StatusRegister1::new_with_raw_value(
            self.read_register_byte(RegisterId::ReadStatus1)?,
        ))
    }

    pub fn show_status(&mut self) -> Result<StatusRegister1, Error> {
        let sr1 = self.read_status_register_1()?;
        if sr1.raw_value() != 0 {
            warn!("QSPI flash status register 1: {:#04x}", sr1.raw_value());
        } else {
            info!("QSPI flash status register 1: {:#04x}", sr1.raw_value());
        }
        Ok(sr1)
    }

    pub fn read_status_register_2(&mut self) -> Result<StatusRegister2, Error> {
        Ok(StatusRegister2::new_with_raw_value(
            self.read_register_byte(RegisterId::ReadStatus2)?,
        ))
    }

    pub fn show_status_2(&mut self) -> Result<StatusRegister2, Error> {
        let sr2 = self.read_status_register_2()?;
        info!("QSPI flash status register 2: {:#04x}", sr2.raw_value());
        Ok(sr2)
    }

    pub fn read_bank_register(&mut self) -> Result<BankAddressRegister, Error> {
        Ok(BankAddressRegister::new_with_raw_value(
            self.read_register_byte(RegisterId::BankRead)?,
        ))
    }

    pub fn show_bank(&mut self) -> Result<BankAddressRegister, Error> {
        let bar = self.read_bank_register()?;
        info!("QSPI flash bank address register: {:#04x}", bar.raw_value());
        Ok(bar)
    }

    /// The register is shifted out least significant byte first.
    pub fn read_autoboot_register(&mut self) -> Result<u32, Error> {
        let mut data = [0; 4];
        self.read_register(RegisterId::AutoBootRead, &mut data)?;
        Ok(u32::from_le_bytes(data))
    }

    pub fn show_autoboot(&mut self) -> Result<u32, Error> {
        let autoboot = self.read_autoboot_register()?;
        info!("QSPI flash autoboot register: {:#010x}", autoboot);
        Ok(autoboot)
    }

    /// The register is shifted out least significant byte first.
    pub fn read_asp_register(&mut self) -> Result<u16, Error> {
        let mut data = [0; 2];
        self.read_register(RegisterId::AspRead, &mut data)?;
        Ok(u16::from_le_bytes(data))
    }

    pub fn show_asp(&mut self) -> Result<u16, Error> {
        let asp = self.read_asp_register()?;
        info!("QSPI flash ASP register: {:#06x}", asp);
        Ok(asp)
    }

    pub fn read_id(&mut self) -> Result<BaseDeviceId, Error> {
        let mut data = [0; 3];
        self.read_register(RegisterId::ReadId, &mut data)?;
        Ok(BaseDeviceId::from_raw(&data))
    }

    pub fn show_id(&mut self) -> Result<BaseDeviceId, Error> {
        let id = self.read_id()?;
        info!(
            "QSPI flash manufacturer ID: {:#04x}, device ID: {:#06x}",
            id.manufacturer_id(),
            id.device_id_raw()
        );
        if !id.is_spansion() {
            warn!("QSPI flash is not a Spansion device");
        }
        match (id.memory_interface_type(), id.density()) {
            (Ok(interface), Ok(density)) => {
                info!("QSPI flash interface {:?}, density {:?}", interface, density)
            }
            _ => warn!("QSPI flash device ID {:#06x} unknown", id.device_id_raw()),
        }
        Ok(id)
    }

    pub fn read_config_register(&mut self) -> Result<ConfigRegister1, Error> {
        Ok(ConfigRegister1::new_with_raw_value(
            self.read_register_byte(RegisterId::ReadConfig)?,
        ))
    }

    pub fn show_config(&mut self) -> Result<ConfigRegister1, Error> {
        let cr1 = self.read_config_register()?;
        info!("QSPI flash configuration register: {:#04x}", cr1.raw_value());
        Ok(cr1)
    }

    /// Read-modify-write of the configuration register.
    ///
    /// The bits of `set` are set, then the bits of `clear` are cleared. Status register 1 is
    /// written back with its current protection settings. The written value is verified by
    /// reading the configuration register again, which is returned on success.
    pub fn write_config(&mut self, set: u8, clear: u8) -> Result<ConfigRegister1, Error> {
        crate::dbg_print_func_begin!("write_config");
        let old = self.read_config_register()?.raw_value();
        info!("QSPI flash configuration register before write: {:#04x}", old);
        let sr1 = self.read_status_register_1()?.raw_value() & SR1_WRITABLE_BITS;
        crate::dbg_print_var_hex!(sr1);

        let new = (old | set) & !clear;
        if (new & !old) & CR1_OTP_BITS != 0 {
            warn!(
                "QSPI flash: permanently setting OTP configuration bits {:#04x}",
                (new & !old) & CR1_OTP_BITS
            );
        }
        if (old & !new) & CR1_OTP_BITS != 0 {
            warn!(
                "QSPI flash: OTP configuration bits {:#04x} can not be cleared",
                (old & !new) & CR1_OTP_BITS
            );
        }

        self.write_enable()?;
        info!("QSPI flash configuration register write: {:#04x}", new);
        self.qspi
            .polled_transfer(&[RegisterId::WriteRegisters as u8, sr1, new], None)?;

        let poll_result = self.wait_for_write_completion();
        self.write_disable()?;
        poll_result?;

        let actual = self.read_config_register()?;
        if actual.raw_value() != new {
            warn!(
                "QSPI flash configuration register is {:#04x} after write, expected {:#04x}",
                actual.raw_value(),
                new
            );
            return Err(Error::ConfigMismatch {
                expected: new,
                actual: actual.raw_value(),
            });
        }
        info!(
            "QSPI flash configuration register after write: {:#04x}",
            actual.raw_value()
        );
        Ok(actual)
    }

    fn wait_for_write_completion(&mut self) -> Result<(), Error> {
        let polls = self.config.write_poll_limit;
        for _ in 0..polls {
            let sr1 = self.read_status_register_1()?;
            if sr1.programming_error() {
                warn!(
                    "QSPI flash programming error, status register 1: {:#04x}",
                    sr1.raw_value()
                );
                self.clear_status()?;
                return Err(Error::ProgramError);
            }
            if !sr1.write_in_progress() {
                return Ok(());
            }
        }
        warn!("QSPI flash register write timeout after {} polls", polls);
        Err(Error::WriteTimeout { polls })
    }

    pub fn set_quad(&mut self) -> Result<ConfigRegister1, Error> {
        self.write_config(CR1_QUAD, 0)
    }

    pub fn clear_quad(&mut self) -> Result<ConfigRegister1, Error> {
        self.write_config(0, CR1_QUAD)
    }

    pub fn set_latency_code(&mut self) -> Result<ConfigRegister1, Error> {
        self.write_config(CR1_LATENCY_CODE, 0)
    }

    pub fn clear_latency_code(&mut self) -> Result<ConfigRegister1, Error> {
        self.write_config(0, CR1_LATENCY_CODE)
    }

    /// Set the QUAD bit if it is not set. No write is performed otherwise.
    pub fn ensure_quad(&mut self) -> Result<ConfigRegister1, Error> {
        let cr1 = self.read_config_register()?;
        if cr1.quad() {
            return Ok(cr1);
        }
        warn!("QSPI flash QUAD bit lost, setting it again");
        self.set_quad()
    }

    pub fn check_config(&mut self, expected: u8) -> Result<(), Error> {
        let actual = self.read_config_register()?.raw_value();
        if actual != expected {
            warn!(
                "caution: QSPI flash configuration register is {:#04x}, expected {:#04x}",
                actual, expected
            );
            return Err(Error::ConfigMismatch { expected, actual });
        }
        Ok(())
    }

    pub fn show_all_status(&mut self, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.show_id()?;
        self.show_status()?;
        self.show_status_2()?;
        self.show_bank()?;
        self.show_autoboot()?;
        self.show_asp()?;
        self.show_config()?;
        self.show_status()?;
        self.show_config()?;
        delay.delay_ms(STATUS_SETTLE_DELAY_MS);
        Ok(())
    }

    /// Like [Self::check_config], but a mismatch is only logged.
    fn caution_config(&mut self, expected: u8) -> Result<(), Error> {
        match self.check_config(expected) {
            Err(Error::ConfigMismatch { .. }) => Ok(()),
            result => result,
        }
    }

    /// Boot configuration: quad I/O enabled, latency code 0b00.
    ///
    /// A configuration register which differs from the boot configuration afterwards, for
    /// example because of OTP bits set in the factory, only causes a warning.
    pub fn init(&mut self) -> Result<ConfigRegister1, Error> {
        self.show_status()?;
        self.show_config()?;
        self.write_config(CR1_QUAD, CR1_LATENCY_CODE)?;
        self.caution_config(CR1_QUAD)?;
        self.show_status()?;
        self.show_config()
    }

    /// Toggle the QUAD and latency code bits twice, ending in the boot configuration.
    pub fn exercise_config_bits(&mut self) -> Result<ConfigRegister1, Error> {
        self.show_status()?;
        self.show_config()?;
        for _ in 0..2 {
            self.clear_quad()?;
            self.set_quad()?;
            self.set_latency_code()?;
            self.clear_latency_code()?;
        }
        self.caution_config(CR1_QUAD)?;
        self.show_status()?;
        self.show_config()
    }
}

impl<Q: PolledTransfer + FifoStatusCheck> SpansionFlash<Q> {
    pub fn init_test(&mut self) -> Result<ConfigRegister1, Error> {
        self.qspi.fifo_status_check()?;
        self.show_status()?;
        self.show_config()?;
        self.set_latency_code()?;
        self.show_status()?;
        self.show_config()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::qspi::FifoStatus;
    use std::vec::Vec;

    const SR1_WIP: u8 = 1 << 0;
    const SR1_WEL: u8 = 1 << 1;
    const SR1_P_ERR: u8 = 1 << 6;
    const SR1_E_ERR: u8 = 1 << 5;

    /// Simulated S25FL flash which answers the register commands.
    struct FlashSim {
        sr1: u8,
        sr2: u8,
        cr1: u8,
        bar: u8,
        autoboot: u32,
        asp: u16,
        id: [u8; 3],
        busy_polls_per_write: u32,
        busy_polls: u32,
        stuck_busy: bool,
        program_error_on_write: bool,
        ignore_writes: bool,
        fail_command: Option<u8>,
        fifo_checks: u32,
        commands: Vec<u8>,
        register_writes: Vec<(u8, u8)>,
    }

    impl Default for FlashSim {
        fn default() -> Self {
            Self {
                sr1: 0,
                sr2: 0,
                cr1: 0xC0,
                bar: 0,
                autoboot: 0,
                asp: 0xFE7F,
                id: [0x01, 0x02, 0x19],
                busy_polls_per_write: 3,
                busy_polls: 0,
                stuck_busy: false,
                program_error_on_write: false,
                ignore_writes: false,
                fail_command: None,
                fifo_checks: 0,
                commands: Vec::new(),
                register_writes: Vec::new(),
            }
        }
    }

    impl FlashSim {
        fn status_1(&mut self) -> u8 {
            let mut sr1 = self.sr1;
            if self.stuck_busy || self.busy_polls > 0 {
                sr1 |= SR1_WIP;
                self.busy_polls = self.busy_polls.saturating_sub(1);
            }
            sr1
        }
    }

    impl PolledTransfer for FlashSim {
        fn polled_transfer(
            &mut self,
            tx: &[u8],
            rx: Option<&mut [u8]>,
        ) -> Result<(), TransferError> {
            let cmd = tx[0];
            self.commands.push(cmd);
            if self.fail_command == Some(cmd) {
                return Err(TransferError::Timeout { words_pending: 1 });
            }
            let mut reply = [0u8; 5];
            match cmd {
                0x01 => {
                    assert_ne!(self.sr1 & SR1_WEL, 0, "register write without WREN");
                    self.register_writes.push((tx[1], tx[2]));
                    self.sr1 &= !SR1_WEL;
                    if self.program_error_on_write {
                        self.sr1 |= SR1_P_ERR;
                    } else if !self.ignore_writes {
                        self.sr1 = (self.sr1 & !SR1_WRITABLE_BITS) | (tx[1] & SR1_WRITABLE_BITS);
                        self.cr1 = tx[2] | (self.cr1 & CR1_OTP_BITS);
                    }
                    self.busy_polls = self.busy_polls_per_write;
                }
                0x04 => self.sr1 &= !SR1_WEL,
                0x05 => reply[1] = self.status_1(),
                0x06 => self.sr1 |= SR1_WEL,
                0x07 => reply[1] = self.sr2,
                0x14 => reply[1..5].copy_from_slice(&self.autoboot.to_le_bytes()),
                0x16 => reply[1] = self.bar,
                0x2B => reply[1..3].copy_from_slice(&self.asp.to_le_bytes()),
                0x30 => self.sr1 &= !(SR1_P_ERR | SR1_E_ERR),
                0x35 => reply[1] = self.cr1,
                0x9F => reply[1..4].copy_from_slice(&self.id),
                0xF0 => (),
                _ => panic!("unexpected command {:#04x}", cmd),
            }
            if let Some(rx) = rx {
                rx.copy_from_slice(&reply[..rx.len()]);
            }
            Ok(())
        }
    }

    impl FifoStatusCheck for FlashSim {
        fn fifo_status_check(&mut self) -> Result<FifoStatus, FifoError> {
            self.fifo_checks += 1;
            Ok(FifoStatus {
                rx_threshold: 1,
                tx_threshold: 1,
                drained_words: 0,
            })
        }
    }

    #[derive(Default)]
    struct DelaySum(u64);

    impl DelayNs for DelaySum {
        fn delay_ns(&mut self, ns: u32) {
            self.0 += ns as u64;
        }
    }

    fn flash(sim: FlashSim) -> SpansionFlash<FlashSim> {
        SpansionFlash::new(sim, Config::default())
    }

    fn flash_with_poll_limit(sim: FlashSim, write_poll_limit: u32) -> SpansionFlash<FlashSim> {
        SpansionFlash::new(sim, Config { write_poll_limit })
    }

    #[test]
    fn default_config() {
        assert_eq!(Config::default().write_poll_limit, 1_000_000);
    }

    #[test]
    fn init_sets_quad_and_clears_latency_code() {
        let mut flash = flash(FlashSim::default());
        let cr1 = flash.init().unwrap();
        assert_eq!(cr1.raw_value(), 0x02);
        assert!(cr1.quad());
        assert_eq!(cr1.latency_code(), u2::new(0));
        let sim = flash.release();
        assert_eq!(sim.register_writes, [(0x00, 0x02)]);
        assert_eq!(sim.cr1, 0x02);
        // Write enable latch cleared again.
        assert_eq!(sim.sr1 & SR1_WEL, 0);
    }

    #[test]
    fn write_config_command_sequence() {
        let mut flash = flash(FlashSim::default());
        flash.write_config(CR1_QUAD, CR1_LATENCY_CODE).unwrap();
        let sim = flash.release();
        // RDCR, RDSR1, WREN, WRR, 4 busy polls, WRDI, RDCR
        assert_eq!(
            sim.commands,
            [0x35, 0x05, 0x06, 0x01, 0x05, 0x05, 0x05, 0x05, 0x04, 0x35]
        );
    }

    #[test]
    fn write_config_preserves_status_register_protection() {
        let mut flash = flash(FlashSim {
            sr1: 0x9C,
            ..Default::default()
        });
        flash.write_config(CR1_QUAD, 0).unwrap();
        let sim = flash.release();
        assert_eq!(sim.register_writes, [(0x9C, 0xC2)]);
        assert_eq!(sim.sr1, 0x9C);
    }

    #[test]
    fn write_config_strips_read_only_status_bits() {
        let mut flash = flash(FlashSim {
            sr1: 0x84 | SR1_E_ERR,
            ..Default::default()
        });
        flash.write_config(CR1_QUAD, 0).unwrap();
        assert_eq!(flash.release().register_writes, [(0x84, 0xC2)]);
    }

    #[test]
    fn write_config_timeout() {
        let mut flash = flash_with_poll_limit(
            FlashSim {
                stuck_busy: true,
                ..Default::default()
            },
            10,
        );
        assert_eq!(
            flash.write_config(CR1_QUAD, 0),
            Err(Error::WriteTimeout { polls: 10 })
        );
        let sim = flash.release();
        let status_polls = sim.commands[4..].iter().filter(|&&c| c == 0x05).count();
        assert_eq!(status_polls, 10);
        assert_eq!(sim.commands.last(), Some(&0x04));
    }

    #[test]
    fn write_config_program_error() {
        let mut flash = flash(FlashSim {
            program_error_on_write: true,
            ..Default::default()
        });
        assert_eq!(flash.write_config(CR1_QUAD, 0), Err(Error::ProgramError));
        let sim = flash.release();
        let tail = &sim.commands[sim.commands.len() - 2..];
        assert_eq!(tail, [0x30, 0x04]);
        assert_eq!(sim.sr1 & SR1_P_ERR, 0);
    }

    #[test]
    fn write_config_otp_bit_mismatch() {
        let mut flash = flash(FlashSim {
            cr1: 0x22,
            ..Default::default()
        });
        assert_eq!(
            flash.write_config(0, 0x20),
            Err(Error::ConfigMismatch {
                expected: 0x02,
                actual: 0x22
            })
        );
    }

    #[test]
    fn write_config_ignored_by_flash() {
        let mut flash = flash(FlashSim {
            ignore_writes: true,
            ..Default::default()
        });
        assert_eq!(
            flash.set_quad(),
            Err(Error::ConfigMismatch {
                expected: 0xC2,
                actual: 0xC0
            })
        );
    }

    #[test]
    fn ensure_quad_only_writes_if_required() {
        let mut flash = flash(FlashSim {
            cr1: 0x02,
            ..Default::default()
        });
        assert_eq!(flash.ensure_quad().unwrap().raw_value(), 0x02);
        assert!(flash.qspi_mut().register_writes.is_empty());
        flash.qspi_mut().cr1 = 0x00;
        assert_eq!(flash.ensure_quad().unwrap().raw_value(), 0x02);
        assert_eq!(flash.release().register_writes, [(0x00, 0x02)]);
    }

    #[test]
    fn bit_helpers() {
        let mut flash = flash(FlashSim {
            cr1: 0x00,
            ..Default::default()
        });
        assert_eq!(flash.set_latency_code().unwrap().raw_value(), 0xC0);
        assert_eq!(flash.set_quad().unwrap().raw_value(), 0xC2);
        assert_eq!(flash.clear_latency_code().unwrap().raw_value(), 0x02);
        assert_eq!(flash.clear_quad().unwrap().raw_value(), 0x00);
    }

    #[test]
    fn check_config_reports_mismatch() {
        let mut flash = flash(FlashSim::default());
        assert_eq!(
            flash.check_config(0x02),
            Err(Error::ConfigMismatch {
                expected: 0x02,
                actual: 0xC0
            })
        );
        assert!(flash.check_config(0xC0).is_ok());
    }

    #[test]
    fn read_id() {
        let mut flash = flash(FlashSim::default());
        let id = flash.show_id().unwrap();
        assert!(id.is_spansion());
        assert_eq!(id.device_id_raw(), 0x0219);
        assert_eq!(
            id.memory_interface_type(),
            Ok(MemoryInterfaceType::_256MbAndLarger)
        );
        assert_eq!(id.density(), Ok(Density::_256Mb));
        assert_eq!(BaseDeviceId::new(0x01, 0x2018).density(), Ok(Density::_128Mb));
        assert_eq!(BaseDeviceId::new(0x01, 0x0217).density(), Err(0x17));
    }

    #[test]
    fn multi_byte_registers_are_little_endian() {
        let mut flash = flash(FlashSim {
            autoboot: 0x1234_5678,
            asp: 0xFE7F,
            bar: 0x81,
            sr2: 0x02,
            ..Default::default()
        });
        assert_eq!(flash.read_autoboot_register().unwrap(), 0x1234_5678);
        assert_eq!(flash.read_asp_register().unwrap(), 0xFE7F);
        let bar = flash.read_bank_register().unwrap();
        assert!(bar.extended_address());
        assert_eq!(bar.bank_address(), u2::new(1));
        let sr2 = flash.read_status_register_2().unwrap();
        assert!(sr2.erase_suspend());
        assert!(!sr2.program_suspend());
    }

    #[test]
    fn transfer_errors_are_propagated() {
        let mut flash = flash(FlashSim {
            fail_command: Some(0x06),
            ..Default::default()
        });
        assert_eq!(
            flash.init(),
            Err(Error::Transfer(TransferError::Timeout { words_pending: 1 }))
        );
        assert_eq!(flash.release().cr1, 0xC0);
    }

    #[test]
    fn show_all_status_order_and_delay() {
        let mut flash = flash(FlashSim::default());
        let mut delay = DelaySum::default();
        flash.show_all_status(&mut delay).unwrap();
        assert_eq!(delay.0, 100_000_000);
        assert_eq!(
            flash.release().commands,
            [0x9F, 0x05, 0x07, 0x16, 0x14, 0x2B, 0x35, 0x05, 0x35]
        );
    }

    #[test]
    fn init_test_sets_latency_code() {
        let mut flash = flash(FlashSim {
            cr1: 0x02,
            ..Default::default()
        });
        assert_eq!(flash.init_test().unwrap().raw_value(), 0xC2);
        assert_eq!(flash.release().fifo_checks, 1);
    }

    #[test]
    fn exercise_config_bits_ends_in_boot_config() {
        let mut flash = flash(FlashSim {
            cr1: 0x02,
            ..Default::default()
        });
        assert_eq!(flash.exercise_config_bits().unwrap().raw_value(), 0x02);
        let sim = flash.release();
        assert_eq!(sim.register_writes.len(), 8);
        assert_eq!(sim.cr1, 0x02);
        assert_eq!(sim.commands[..2], [0x05, 0x35]);
        assert_eq!(sim.commands[sim.commands.len() - 3..], [0x35, 0x05, 0x35]);
    }

    #[test]
    fn init_with_otp_bits_set_only_warns() {
        let mut flash = flash(FlashSim {
            cr1: 0xC4,
            ..Default::default()
        });
        let cr1 = flash.init().unwrap();
        assert_eq!(cr1.raw_value(), 0x06);
        assert!(cr1.quad());
        assert!(cr1.tbparm());
        let sim = flash.release();
        assert_eq!(sim.register_writes, [(0x00, 0x06)]);
        // Caution check, then SR1 and CR1 are shown.
        assert_eq!(sim.commands[sim.commands.len() - 3..], [0x35, 0x05, 0x35]);
    }

    #[test]
    fn init_propagates_write_timeout() {
        let mut flash = flash_with_poll_limit(
            FlashSim {
                stuck_busy: true,
                ..Default::default()
            },
            4,
        );
        assert_eq!(flash.init(), Err(Error::WriteTimeout { polls: 4 }));
    }

    #[test]
    fn register_opcodes() {
        assert_eq!(RegisterId::WriteRegisters as u8, 0x01);
        assert_eq!(RegisterId::ReadStatus1 as u8, 0x05);
        assert_eq!(RegisterId::ReadStatus2 as u8, 0x07);
        assert_eq!(RegisterId::BankRead as u8, 0x16);
        assert_eq!(RegisterId::ReadConfig as u8, 0x35);
        assert_eq!(RegisterId::ReadId as u8, 0x9F);
    }

    #[test]
    fn reset_sends_reset_command() {
        let mut flash = flash(FlashSim::default());
        flash.reset().unwrap();
        assert_eq!(flash.release().commands, [0xF0]);
    }
}
