//! HopeRF RFM69 driver, configured for RTS OOK packets.
//!
//! The radio is driven in packet mode with on-off keying. Its packet engine does the
//! Manchester coding and the sync word, so an RTS frame is just a 7-byte fixed-length
//! payload. The wake pulse is sent as a raw 2-byte payload with both turned off.
//!
//! ## Bus protocol
//!
//! - Register writes set bit 7 of the address byte, reads clear it.
//! - Multi-byte registers are big-endian and auto-increment.
//! - The FIFO is register `0x00`.
//!
//! ## Timeouts
//!
//! Waiting for a mode change or for a packet to leave is bounded. On timeout the
//! driver logs the IRQ flags, counts the event and carries on; only SPI and pin
//! failures are reported as errors.
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! # use embedded_hal_mock::eh1::spi::{Mock as Spi, Transaction as SpiTransaction};
//! # use embedded_hal_mock::eh1::delay::NoopDelay;
//! use somfy_rts::rfm69::Rfm69;
//! use somfy_rts::Transceiver;
//!
//! # let spi = Spi::new(&[
//! #     SpiTransaction::transaction_start(),
//! #     SpiTransaction::write_vec(vec![0x10]),
//! #     SpiTransaction::read_vec(vec![0x24]),
//! #     SpiTransaction::transaction_end(),
//! # ]);
//! # let reset = Pin::new(&[PinTransaction::set(PinState::Low)]);
//! let mut radio = Rfm69::new(spi, reset, NoopDelay::new());
//! assert_eq!(radio.version(), Ok(0x24));
//! # let (mut spi, mut reset, _) = radio.release();
//! # spi.done();
//! # reset.done();
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Operation, SpiDevice};
use thiserror::Error;

use crate::transceiver::Transceiver;

const REG_FIFO: u8 = 0x00;
const REG_OP_MODE: u8 = 0x01;
const REG_DATA_MODUL: u8 = 0x02;
const REG_BITRATE: u8 = 0x03;
const REG_FRF: u8 = 0x07;
const REG_VERSION: u8 = 0x10;
const REG_PA_LEVEL: u8 = 0x11;
const REG_OCP: u8 = 0x13;
const REG_IRQ_FLAGS: u8 = 0x27;
const REG_PREAMBLE: u8 = 0x2c;
const REG_SYNC_CONFIG: u8 = 0x2e;
const REG_SYNC_VALUE: u8 = 0x2f;
const REG_PACKET_CONFIG: u8 = 0x37;

const WRITE_FLAG: u8 = 0x80;

const MODE_STBY: u8 = 1;
const MODE_TX: u8 = 3;
const MODE_RX: u8 = 4;

/// Packet mode, OOK, no shaping.
const DATA_MODUL_PACKET_OOK: u8 = 0x08;
/// Over-current protection off, default trim.
const OCP_OFF: u8 = 0x0a;
/// PA1 and PA2 on, full output power.
const PA_LEVEL_MAX: u8 = 0x7f;
/// Sync off, 8 byte sync size.
const SYNC_CONFIG_DEFAULT: u8 = 0x38;
const SYNC_ON: u8 = 0x80;
const SYNC_SIZE_MASK: u8 = 0x38;
const SYNC_MAX_LEN: usize = 8;

const PACKET_VARIABLE_LEN: u8 = 0x80;
const PACKET_DC_FREE_MANCHESTER: u8 = 0x20;
const DEFAULT_PAYLOAD_LEN: u8 = 64;

const IRQ1_MODE_READY: u8 = 0x80;
const IRQ2_PACKET_SENT: u8 = 0x08;
const IRQ2_PAYLOAD_READY: u8 = 0x04;

/// Crystal oscillator frequency, in Hz.
const FXOSC_HZ: u32 = 32_000_000;
/// Frequency synthesizer step, in Hz.
const FSTEP_HZ: f64 = 61.035_156_25;

const MODE_READY_POLLS: u32 = 10_000;
const MODE_READY_POLL_US: u32 = 1;
const PACKET_SENT_POLLS: u32 = 100_000;
const PACKET_SENT_POLL_US: u32 = 100;
const RESET_PULSE_MS: u32 = 250;

/// RFM69 bus errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Error<SpiE, PinE> {
    /// An SPI transaction failed.
    #[error("SPI transaction failed: {0:?}")]
    Spi(SpiE),
    /// Driving the reset pin failed.
    #[error("reset pin error: {0:?}")]
    Pin(PinE),
}

/// An RFM69 on an SPI bus, with its reset line.
#[derive(Debug)]
pub struct Rfm69<SPI, RST, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    D: DelayNs,
{
    spi: SPI,
    reset: RST,
    delay: D,
    /// Waits for a mode change that gave up.
    pub mode_timeouts: u16,
    /// Waits for a packet to be sent that gave up.
    pub send_timeouts: u16,
}

impl<SPI, RST, D> Rfm69<SPI, RST, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    D: DelayNs,
{
    /// Creates a driver. The reset line is driven low (radio running).
    pub fn new(spi: SPI, mut reset: RST, delay: D) -> Self {
        let _ = reset.set_low();
        Self {
            spi,
            reset,
            delay,
            mode_timeouts: 0,
            send_timeouts: 0,
        }
    }

    /// Consumes the driver, handing back the bus, reset pin and delay.
    pub fn release(self) -> (SPI, RST, D) {
        (self.spi, self.reset, self.delay)
    }

    /// Sets the bit rate directly, in bits per second.
    pub fn set_bit_rate(&mut self, bps: u32) -> Result<(), Error<SPI::Error, RST::Error>> {
        let reg = (FXOSC_HZ / bps.max(1)).min(u16::MAX as u32) as u16;
        self.write_word(REG_BITRATE, reg)
    }

    /// Symbol width currently programmed, in microseconds.
    pub fn symbol_width(&mut self) -> Result<u16, Error<SPI::Error, RST::Error>> {
        Ok(self.read_word(REG_BITRATE)? / 32)
    }

    /// Whether a complete packet is waiting in the FIFO.
    ///
    /// For boards without the DIO0 line wired to an interrupt: poll this and call
    /// [`RadioQueue::receive_ready`](crate::queue::RadioQueue::receive_ready) when it
    /// turns true.
    pub fn payload_ready(&mut self) -> Result<bool, Error<SPI::Error, RST::Error>> {
        let flags = self.read_irq_flags()?;
        Ok(flags[1] & IRQ2_PAYLOAD_READY != 0)
    }

    fn set_mode(&mut self, mode: u8) -> Result<(), Error<SPI::Error, RST::Error>> {
        self.write_register(REG_OP_MODE, mode << 2)
    }

    fn wait_for_mode(&mut self) -> Result<bool, Error<SPI::Error, RST::Error>> {
        let mut flags = [0u8; 2];
        for _ in 0..MODE_READY_POLLS {
            flags = self.read_irq_flags()?;
            if flags[0] & IRQ1_MODE_READY != 0 {
                return Ok(true);
            }
            self.delay.delay_us(MODE_READY_POLL_US);
        }
        self.mode_timeouts = self.mode_timeouts.wrapping_add(1);
        warn!(
            "Waited too long for mode ready, flags {:#x} {:#x}",
            flags[0], flags[1]
        );
        Ok(false)
    }

    fn wait_for_packet_sent(&mut self) -> Result<bool, Error<SPI::Error, RST::Error>> {
        let mut flags = [0u8; 2];
        for _ in 0..PACKET_SENT_POLLS {
            flags = self.read_irq_flags()?;
            if flags[1] & IRQ2_PACKET_SENT != 0 {
                return Ok(true);
            }
            self.delay.delay_us(PACKET_SENT_POLL_US);
        }
        self.send_timeouts = self.send_timeouts.wrapping_add(1);
        warn!(
            "Waited too long for packet sent, flags {:#x} {:#x}",
            flags[0], flags[1]
        );
        Ok(false)
    }

    fn read_irq_flags(&mut self) -> Result<[u8; 2], Error<SPI::Error, RST::Error>> {
        let mut flags = [0u8; 2];
        self.read_buffer(REG_IRQ_FLAGS, &mut flags)?;
        Ok(flags)
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<SPI::Error, RST::Error>> {
        self.spi.write(&[reg | WRITE_FLAG, value]).map_err(Error::Spi)
    }

    fn write_word(&mut self, reg: u8, value: u16) -> Result<(), Error<SPI::Error, RST::Error>> {
        let [hi, lo] = value.to_be_bytes();
        self.spi.write(&[reg | WRITE_FLAG, hi, lo]).map_err(Error::Spi)
    }

    fn write_buffer(&mut self, reg: u8, data: &[u8]) -> Result<(), Error<SPI::Error, RST::Error>> {
        self.spi
            .transaction(&mut [Operation::Write(&[reg | WRITE_FLAG]), Operation::Write(data)])
            .map_err(Error::Spi)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, Error<SPI::Error, RST::Error>> {
        let mut value = [0u8; 1];
        self.read_buffer(reg, &mut value)?;
        Ok(value[0])
    }

    fn read_word(&mut self, reg: u8) -> Result<u16, Error<SPI::Error, RST::Error>> {
        let mut value = [0u8; 2];
        self.read_buffer(reg, &mut value)?;
        Ok(u16::from_be_bytes(value))
    }

    fn read_buffer(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<SPI::Error, RST::Error>> {
        self.spi
            .transaction(&mut [Operation::Write(&[reg & !WRITE_FLAG]), Operation::Read(buf)])
            .map_err(Error::Spi)
    }
}

/// Value of the 16-bit packet configuration register pair (`0x37`/`0x38`).
///
/// A `payload_len` of 0 selects variable-length packets of up to 255 bytes.
fn packet_config(manchester: bool, payload_len: u8) -> u16 {
    let mut config = 0u8;
    if payload_len == 0 {
        config |= PACKET_VARIABLE_LEN;
    }
    if manchester {
        config |= PACKET_DC_FREE_MANCHESTER;
    }
    let len = if payload_len == 0 { u8::MAX } else { payload_len };
    u16::from_be_bytes([config, len])
}

impl<SPI, RST, D> Transceiver for Rfm69<SPI, RST, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    D: DelayNs,
{
    type Error = Error<SPI::Error, RST::Error>;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.reset.set_high().map_err(Error::Pin)?;
        self.delay.delay_ms(RESET_PULSE_MS);
        self.reset.set_low().map_err(Error::Pin)?;
        self.delay.delay_ms(RESET_PULSE_MS);
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), Self::Error> {
        self.set_mode(MODE_STBY)?;
        self.write_register(REG_DATA_MODUL, DATA_MODUL_PACKET_OOK)?;
        self.write_register(REG_OCP, OCP_OFF)?;
        self.write_register(REG_PA_LEVEL, PA_LEVEL_MAX)?;
        self.write_register(REG_SYNC_CONFIG, SYNC_CONFIG_DEFAULT)?;
        self.write_word(REG_PACKET_CONFIG, packet_config(true, DEFAULT_PAYLOAD_LEN))?;
        // RTS frames carry their own preamble
        self.write_word(REG_PREAMBLE, 0)
    }

    fn set_frequency(&mut self, mhz: f64) -> Result<(), Self::Error> {
        let frf = libm::round(mhz * 1_000_000.0 / FSTEP_HZ) as u32;
        let [_, msb, mid, lsb] = frf.to_be_bytes();
        self.spi
            .write(&[REG_FRF | WRITE_FLAG, msb, mid, lsb])
            .map_err(Error::Spi)
    }

    fn frequency(&mut self) -> Result<f64, Self::Error> {
        let mut frf = [0u8; 3];
        self.read_buffer(REG_FRF, &mut frf)?;
        let frf = u32::from_be_bytes([0, frf[0], frf[1], frf[2]]);
        Ok(frf as f64 * FSTEP_HZ / 1_000_000.0)
    }

    fn set_symbol_width(&mut self, us: u16) -> Result<(), Self::Error> {
        let reg = (32 * us as u32).min(u16::MAX as u32) as u16;
        self.write_word(REG_BITRATE, reg)
    }

    fn bit_rate(&mut self) -> Result<u32, Self::Error> {
        let reg = self.read_word(REG_BITRATE)?;
        Ok(FXOSC_HZ.checked_div(reg as u32).unwrap_or(0))
    }

    fn version(&mut self) -> Result<u8, Self::Error> {
        self.read_register(REG_VERSION)
    }

    fn set_sync_bytes(&mut self, pattern: &[u8]) -> Result<(), Self::Error> {
        let pattern = &pattern[..pattern.len().min(SYNC_MAX_LEN)];
        let mut config = self.read_register(REG_SYNC_CONFIG)?;
        if pattern.is_empty() {
            config &= !SYNC_ON;
        } else {
            let size = (pattern.len() as u8 - 1) << 3;
            config = (config & !(SYNC_ON | SYNC_SIZE_MASK)) | SYNC_ON | size;
        }
        self.write_register(REG_SYNC_CONFIG, config)?;
        if !pattern.is_empty() {
            self.write_buffer(REG_SYNC_VALUE, pattern)?;
        }
        Ok(())
    }

    fn set_packet_format(&mut self, manchester: bool, fixed_len: u8) -> Result<(), Self::Error> {
        self.write_word(REG_PACKET_CONFIG, packet_config(manchester, fixed_len))
    }

    fn transmit_packet(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let _ = self.wait_for_mode()?;
        self.write_buffer(REG_FIFO, bytes)?;
        self.set_mode(MODE_TX)?;
        let _ = self.wait_for_mode()?;
        let _ = self.wait_for_packet_sent()?;
        self.set_mode(MODE_STBY)
    }

    fn receive_packet(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.read_buffer(REG_FIFO, buf)
    }

    fn enable_receive(&mut self) -> Result<(), Self::Error> {
        self.set_mode(MODE_RX)?;
        let _ = self.wait_for_mode()?;
        Ok(())
    }

    fn standby(&mut self) -> Result<(), Self::Error> {
        self.set_mode(MODE_STBY)?;
        let _ = self.wait_for_mode()?;
        Ok(())
    }
}
