//! Radio transceiver interface.
//!
//! The engine drives the radio only through this trait, and only from the worker
//! context. [`Rfm69`](crate::rfm69::Rfm69) is the bundled implementation; boards with
//! a different front-end implement the trait themselves.
//!
//! ## Receive notification
//!
//! [`enable_receive`](Transceiver::enable_receive) only arms the hardware. The
//! "packet ready" interrupt (DIO0 on an RFM69) must be routed by the board to
//! [`RadioQueue::receive_ready`](crate::queue::RadioQueue::receive_ready) on the queue
//! instance the worker serves, so the handler holds a reference to that queue rather
//! than reaching for a global.

use core::fmt::Debug;

/// A half-duplex OOK transceiver able to send raw or framed packets.
///
/// All operations are blocking. Timeouts while waiting on status flags are the
/// implementation's business: they should be logged and the operation should carry
/// on, since there is no second radio to fall back to. `Err` is reserved for bus
/// failures.
pub trait Transceiver {
    /// Bus or pin error type.
    type Error: Debug;

    /// Hardware reset of the radio.
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Puts the radio into the base configuration used by RTS (OOK packet mode).
    fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Sets the carrier frequency, in MHz.
    fn set_frequency(&mut self, mhz: f64) -> Result<(), Self::Error>;

    /// Reads back the carrier frequency, in MHz.
    fn frequency(&mut self) -> Result<f64, Self::Error>;

    /// Sets the symbol width, in microseconds.
    fn set_symbol_width(&mut self, us: u16) -> Result<(), Self::Error>;

    /// Reads back the bit rate, in bits per second.
    fn bit_rate(&mut self) -> Result<u32, Self::Error>;

    /// Silicon version of the radio.
    fn version(&mut self) -> Result<u8, Self::Error>;

    /// Sets the sync word. An empty pattern disables sync detection/generation.
    fn set_sync_bytes(&mut self, pattern: &[u8]) -> Result<(), Self::Error>;

    /// Sets the packet format: Manchester coding on/off and a fixed payload length.
    fn set_packet_format(&mut self, manchester: bool, fixed_len: u8) -> Result<(), Self::Error>;

    /// Sends one packet and blocks until it has left the antenna.
    fn transmit_packet(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Reads a received packet into `buf`.
    fn receive_packet(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Starts listening continuously.
    fn enable_receive(&mut self) -> Result<(), Self::Error>;

    /// Stops transmitting/receiving and parks the radio in standby.
    fn standby(&mut self) -> Result<(), Self::Error>;
}
