//! # QSPI module
//!
//! Polled I/O mode driver for the QSPI flash controller.
//!
//! The flash command layer, for example [crate::qspi_spansion], talks to the controller
//! through the [PolledTransfer] trait, which allows testing it without hardware.
use core::ops::{Deref, DerefMut};

use arbitrary_int::u3;
use log::{debug, info, warn};
use zynq7000_fsbl_pac::qspi::{
    InstructionCode, LINEAR_FLASH_BASE_ADDR, LinearQspiConfig, MmioQspi, SpiEnable,
};

pub use zynq7000_fsbl_pac::qspi::InterruptStatus;

/// Depth of the TX and RX FIFO in 32-bit words.
pub const FIFO_DEPTH: usize = 63;
pub const DEFAULT_POLL_LIMIT: u32 = 1_000_000;
pub const DEFAULT_FIFO_DRAIN_LIMIT: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Status polls without any FIFO progress before a transfer is aborted.
    pub poll_limit: u32,
    /// Maximum number of words popped by [FifoStatusCheck::fifo_status_check].
    pub fifo_drain_limit: u32,
    pub dual_flash: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_limit: DEFAULT_POLL_LIMIT,
            fifo_drain_limit: DEFAULT_FIFO_DRAIN_LIMIT,
            dual_flash: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("transfer without any bytes")]
    EmptyTransfer,
    #[error("receive buffer of {rx_len} bytes is smaller than the {tx_len} bytes sent")]
    RxBufferTooSmall { tx_len: usize, rx_len: usize },
    #[error("transfer timed out with {words_pending} words pending")]
    Timeout { words_pending: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FifoError {
    #[error("RX FIFO still not empty after draining {drained_words} words")]
    DrainTimeout { drained_words: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoStatus {
    pub rx_threshold: u32,
    pub tx_threshold: u32,
    /// Stale words which were popped from the RX FIFO.
    pub drained_words: u32,
}

/// Raw values of all controller registers which can be read without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub config: u32,
    pub interrupt_status: u32,
    pub interrupt_mask: u32,
    pub spi_enable: u32,
    pub delay: u32,
    pub slave_idle_count: u32,
    pub tx_fifo_threshold: u32,
    pub rx_fifo_threshold: u32,
    pub gpio: u32,
    pub loopback_master_clock_delay: u32,
    pub linear_qspi_config: u32,
    pub linear_qspi_status: u32,
    pub module_id: u32,
}

/// Full-duplex polled transfer with a flash device.
pub trait PolledTransfer {
    /// Clock out all bytes of `tx` while chip select is asserted.
    ///
    /// If `rx` is provided, it receives one byte for each sent byte. Byte 0 is the byte
    /// clocked in during the instruction.
    fn polled_transfer(&mut self, tx: &[u8], rx: Option<&mut [u8]>) -> Result<(), TransferError>;
}

pub trait FifoStatusCheck {
    /// Log the FIFO thresholds and pop stale words from the RX FIFO.
    fn fifo_status_check(&mut self) -> Result<FifoStatus, FifoError>;
}

/// QSPI controller in manual start and manual chip select I/O mode.
pub struct QspiIoMode {
    regs: MmioQspi<'static>,
    config: Config,
}

impl QspiIoMode {
    pub fn new(regs: MmioQspi<'static>, config: Config) -> Self {
        let mut qspi = Self { regs, config };
        qspi.enable_io_mode();
        qspi
    }

    #[inline]
    pub fn regs(&mut self) -> &mut MmioQspi<'static> {
        &mut self.regs
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn enable_io_mode(&mut self) {
        let dual_flash = self.config.dual_flash;
        self.regs.modify_config(|mut val| {
            val.set_manual_start_enable(true);
            val.set_manual_cs(true);
            val.set_peripheral_chip_select(true);
            val
        });
        self.regs.write_rx_fifo_threshold(0x1);
        self.regs.write_tx_fifo_threshold(0x1);
        self.regs.write_linear_qspi_config(
            LinearQspiConfig::builder()
                .with_enable_linear_mode(false)
                .with_both_memories(dual_flash)
                .with_separate_memory_bus(dual_flash)
                .with_upper_memory_page(false)
                .with_mode_enable(false)
                .with_mode_on(true)
                .with_mode_bits(0xA0)
                .with_num_dummy_bytes(u3::new(0x2))
                .with_instruction_code(InstructionCode::FastReadQuadIo)
                .build(),
        );
    }

    fn enable_linear_addressing(&mut self) {
        let dual_flash = self.config.dual_flash;
        self.regs
            .write_spi_enable(SpiEnable::builder().with_enable(false).build());
        self.regs.modify_config(|mut val| {
            val.set_manual_start_enable(false);
            val.set_manual_cs(false);
            val.set_peripheral_chip_select(false);
            val
        });
        self.regs.write_linear_qspi_config(
            LinearQspiConfig::builder()
                .with_enable_linear_mode(true)
                .with_both_memories(dual_flash)
                .with_separate_memory_bus(dual_flash)
                .with_upper_memory_page(false)
                .with_mode_enable(false)
                .with_mode_on(false)
                .with_mode_bits(0x00)
                .with_num_dummy_bytes(u3::new(0x0))
                .with_instruction_code(InstructionCode::Read)
                .build(),
        );
        self.regs
            .write_spi_enable(SpiEnable::builder().with_enable(true).build());
    }

    pub fn transfer_guard(&mut self) -> QspiIoTransferGuard<'_> {
        QspiIoTransferGuard::new(self)
    }

    /// Transmits 1-byte command and 3-byte data OR 4-byte data.
    #[inline]
    pub fn write_word_txd_00(&mut self, word: u32) {
        self.regs.write_tx_data_00(word);
    }

    /// Transmits 1-byte command.
    #[inline]
    pub fn write_word_txd_01(&mut self, word: u32) {
        self.regs.write_tx_data_01(word);
    }

    /// Transmits 1-byte command and 1-byte data.
    #[inline]
    pub fn write_word_txd_10(&mut self, word: u32) {
        self.regs.write_tx_data_10(word);
    }

    /// Transmits 1-byte command and 2-byte data.
    #[inline]
    pub fn write_word_txd_11(&mut self, word: u32) {
        self.regs.write_tx_data_11(word);
    }

    #[inline]
    pub fn read_rx_data(&mut self) -> u32 {
        self.regs.read_rx_data()
    }

    #[inline]
    pub fn read_status(&mut self) -> InterruptStatus {
        self.regs.read_interrupt_status()
    }

    pub fn transfer_init(&mut self) {
        self.regs.modify_config(|mut val| {
            val.set_peripheral_chip_select(false);
            val
        });
        self.regs
            .write_spi_enable(SpiEnable::builder().with_enable(true).build());
    }

    pub fn transfer_start(&mut self) {
        self.regs.modify_config(|mut val| {
            val.set_manual_start_command(true);
            val
        });
    }

    pub fn transfer_done(&mut self) {
        self.disable_slave_select();
    }

    /// De-assert the manual chip select and disable the controller.
    pub fn disable_slave_select(&mut self) {
        self.regs.modify_config(|mut val| {
            val.set_peripheral_chip_select(true);
            val
        });
        self.regs
            .write_spi_enable(SpiEnable::builder().with_enable(false).build());
    }

    /// Pop at most [FIFO_DEPTH] stale words from the RX FIFO.
    pub fn clear_rx_fifo(&mut self) {
        for _ in 0..FIFO_DEPTH {
            if !self.read_status().rx_not_empty() {
                break;
            }
            self.read_rx_data();
        }
    }

    pub fn snapshot_registers(&mut self) -> RegisterSnapshot {
        RegisterSnapshot {
            config: self.regs.read_config().raw_value(),
            interrupt_status: self.regs.read_interrupt_status().raw_value(),
            interrupt_mask: self.regs.read_interrupt_mask().raw_value(),
            spi_enable: self.regs.read_spi_enable().raw_value(),
            delay: self.regs.read_delay().raw_value(),
            slave_idle_count: self.regs.read_slave_idle_count(),
            tx_fifo_threshold: self.regs.read_tx_fifo_threshold(),
            rx_fifo_threshold: self.regs.read_rx_fifo_threshold(),
            gpio: self.regs.read_gpio().raw_value(),
            loopback_master_clock_delay: self.regs.read_loopback_master_clock_delay().raw_value(),
            linear_qspi_config: self.regs.read_linear_qspi_config().raw_value(),
            linear_qspi_status: self.regs.read_linear_qspi_status().raw_value(),
            module_id: self.regs.read_module_id(),
        }
    }

    /// Log all readable controller registers.
    pub fn dump_registers(&mut self) -> RegisterSnapshot {
        let snapshot = self.snapshot_registers();
        info!("QSPI register dump:");
        info!("  config: {:#010x}", snapshot.config);
        info!("  interrupt status: {:#010x}", snapshot.interrupt_status);
        info!("  interrupt mask: {:#010x}", snapshot.interrupt_mask);
        info!("  enable: {:#010x}", snapshot.spi_enable);
        info!("  delay: {:#010x}", snapshot.delay);
        info!("  slave idle count: {:#010x}", snapshot.slave_idle_count);
        info!("  TX FIFO threshold: {:#010x}", snapshot.tx_fifo_threshold);
        info!("  RX FIFO threshold: {:#010x}", snapshot.rx_fifo_threshold);
        info!("  GPIO: {:#010x}", snapshot.gpio);
        info!(
            "  loopback master clock delay: {:#010x}",
            snapshot.loopback_master_clock_delay
        );
        info!("  linear config: {:#010x}", snapshot.linear_qspi_config);
        info!("  linear status: {:#010x}", snapshot.linear_qspi_status);
        info!("  module ID: {:#010x}", snapshot.module_id);
        snapshot
    }

    /// Switch to linear addressing, dump the first `words` words of the flash and return to
    /// I/O mode.
    ///
    /// # Safety
    ///
    /// The flash must be connected and mapped at [LINEAR_FLASH_BASE_ADDR] and no other
    /// context may use the controller during the dump.
    pub unsafe fn dump_linear_flash(&mut self, words: usize) {
        self.enable_linear_addressing();
        info!(
            "QSPI linear flash dump, {} bytes at {:#010x}:",
            words * 4,
            LINEAR_FLASH_BASE_ADDR
        );
        unsafe { dump_words(LINEAR_FLASH_BASE_ADDR, words) };
        self.regs
            .write_spi_enable(SpiEnable::builder().with_enable(false).build());
        self.enable_io_mode();
    }

    /// Disable the controller and return the register block.
    pub fn release(mut self) -> MmioQspi<'static> {
        self.disable_slave_select();
        self.regs
    }

    /// Busy-wait for one RX word. Returns [None] after `poll_limit` polls.
    fn wait_for_rx_word(&mut self, poll_limit: u32) -> Option<u32> {
        for _ in 0..poll_limit {
            if self.read_status().rx_not_empty() {
                return Some(self.read_rx_data());
            }
        }
        None
    }

    /// Transfers of up to three bytes use the TXD1 to TXD3 registers. The reply is
    /// right-aligned in the received word.
    fn transfer_short(
        &mut self,
        tx: &[u8],
        rx: Option<&mut [u8]>,
    ) -> Result<(), TransferError> {
        let poll_limit = self.config.poll_limit;
        let len = tx.len();
        let mut raw_word = [0; 4];
        raw_word[..len].copy_from_slice(tx);
        let word = u32::from_le_bytes(raw_word);
        let mut transfer = self.transfer_guard();
        match len {
            1 => transfer.write_word_txd_01(word),
            2 => transfer.write_word_txd_10(word),
            _ => transfer.write_word_txd_11(word),
        }
        transfer.start();
        let reply = transfer
            .wait_for_rx_word(poll_limit)
            .ok_or(TransferError::Timeout { words_pending: 1 })?;
        drop(transfer);
        if let Some(rx) = rx {
            let reply_bytes = (reply >> ((4 - len) * 8)).to_le_bytes();
            rx[..len].copy_from_slice(&reply_bytes[..len]);
        }
        Ok(())
    }

    fn transfer_words(
        &mut self,
        tx: &[u8],
        mut rx: Option<&mut [u8]>,
    ) -> Result<(), TransferError> {
        let poll_limit = self.config.poll_limit;
        let total_words = tx.len().div_ceil(4);
        let mut tx_words = tx.chunks(4).map(|chunk| {
            let mut raw_word = [0; 4];
            raw_word[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(raw_word)
        });

        let mut transfer = self.transfer_guard();
        let mut written_words = 0;
        for word in tx_words.by_ref().take(FIFO_DEPTH) {
            transfer.write_word_txd_00(word);
            written_words += 1;
        }
        transfer.start();

        let mut read_words = 0;
        let mut idle_polls = 0;
        while read_words < total_words {
            let mut progress = false;
            let rx_not_empty = transfer.read_status().rx_not_empty();
            // Double read, the first status read might be outdated.
            if rx_not_empty && transfer.read_status().rx_not_empty() {
                let reply = transfer.read_rx_data();
                if let Some(rx) = rx.as_deref_mut() {
                    let start = read_words * 4;
                    let end = core::cmp::min(start + 4, tx.len());
                    rx[start..end].copy_from_slice(&reply.to_le_bytes()[..end - start]);
                }
                read_words += 1;
                progress = true;
            }
            if written_words < total_words
                && !transfer.read_status().tx_full()
                && let Some(word) = tx_words.next()
            {
                transfer.write_word_txd_00(word);
                written_words += 1;
                progress = true;
            }
            if progress {
                idle_polls = 0;
                continue;
            }
            idle_polls += 1;
            if idle_polls >= poll_limit {
                warn!(
                    "QSPI transfer timeout, {} of {} words received",
                    read_words, total_words
                );
                return Err(TransferError::Timeout {
                    words_pending: total_words - read_words,
                });
            }
        }
        Ok(())
    }
}

impl PolledTransfer for QspiIoMode {
    fn polled_transfer(&mut self, tx: &[u8], rx: Option<&mut [u8]>) -> Result<(), TransferError> {
        if tx.is_empty() {
            return Err(TransferError::EmptyTransfer);
        }
        if let Some(rx) = rx.as_deref()
            && rx.len() < tx.len()
        {
            return Err(TransferError::RxBufferTooSmall {
                tx_len: tx.len(),
                rx_len: rx.len(),
            });
        }
        if tx.len() < 4 {
            self.transfer_short(tx, rx)
        } else {
            self.transfer_words(tx, rx)
        }
    }
}

impl FifoStatusCheck for QspiIoMode {
    fn fifo_status_check(&mut self) -> Result<FifoStatus, FifoError> {
        let rx_threshold = self.regs.read_rx_fifo_threshold();
        let tx_threshold = self.regs.read_tx_fifo_threshold();
        info!(
            "QSPI RX FIFO threshold: {}, TX FIFO threshold: {}",
            rx_threshold, tx_threshold
        );
        let mut drained_words = 0;
        while self.read_status().rx_not_empty() {
            if drained_words >= self.config.fifo_drain_limit {
                warn!(
                    "QSPI RX FIFO not empty after draining {} words",
                    drained_words
                );
                return Err(FifoError::DrainTimeout { drained_words });
            }
            let word = self.read_rx_data();
            debug!("drained stale RX word {:#010x}", word);
            drained_words += 1;
        }
        Ok(FifoStatus {
            rx_threshold,
            tx_threshold,
            drained_words,
        })
    }
}

/// This guard structure takes care of commonly required operations before starting a transfer
/// and after finishing it.
pub struct QspiIoTransferGuard<'a>(&'a mut QspiIoMode);

impl<'a> QspiIoTransferGuard<'a> {
    pub fn new(qspi: &'a mut QspiIoMode) -> Self {
        qspi.clear_rx_fifo();
        qspi.transfer_init();
        Self(qspi)
    }
}

impl QspiIoTransferGuard<'_> {
    pub fn start(&mut self) {
        self.0.transfer_start();
    }
}

impl Deref for QspiIoTransferGuard<'_> {
    type Target = QspiIoMode;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for QspiIoTransferGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl Drop for QspiIoTransferGuard<'_> {
    fn drop(&mut self) {
        self.0.transfer_done();
    }
}

/// # Safety
///
/// `words` words starting at `base_addr` must be readable.
unsafe fn dump_words(base_addr: usize, words: usize) {
    let base = base_addr as *const u32;
    let mut row = [0u32; 4];
    let mut idx = 0;
    while idx < words {
        let row_len = core::cmp::min(row.len(), words - idx);
        for (offset, word) in row[..row_len].iter_mut().enumerate() {
            *word = unsafe { core::ptr::read_volatile(base.add(idx + offset)) };
        }
        crate::dbg::mem_word_dump(base_addr + idx * 4, &row[..row_len]);
        idx += row_len;
    }
}
