//! Radio configuration applied by the worker.

use crate::consts::{RTS_FREQUENCY_MHZ, RTS_PROTOCOL_KEY, RTS_SYMBOL_WIDTH_US};

/// Settings the worker applies to the transceiver at start-up and to every frame it sends.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct RadioConfig {
    /// Carrier frequency in MHz.
    pub frequency_mhz: f64,
    /// Symbol width in microseconds.
    pub symbol_width_us: u16,
    /// Key byte written at offset 0 of every outbound frame.
    pub protocol_key: u8,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            frequency_mhz: RTS_FREQUENCY_MHZ,
            symbol_width_us: RTS_SYMBOL_WIDTH_US,
            protocol_key: RTS_PROTOCOL_KEY,
        }
    }
}
