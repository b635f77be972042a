//! RTS frame codec.
//!
//! An RTS frame is 7 bytes long:
//!
//! | Offset | Content |
//! |--------|---------|
//! | 0      | fixed protocol key |
//! | 1      | high nibble = [`Button`] mask, low nibble = checksum |
//! | 2..=3  | rolling code, big-endian |
//! | 4..=6  | remote identity (24 bits), big-endian |
//!
//! ## Checksum and obfuscation
//!
//! The checksum is the low nibble of `XOR(b ^ (b >> 4))` over all seven bytes, computed
//! with the checksum nibble zeroed. After the checksum is stored the frame is
//! "encrypted" by chaining every byte onto its predecessor, in ascending order:
//! `frame[i] ^= frame[i - 1]` for `i = 1..=6`. Decoding undoes the chain in descending
//! order before re-deriving the checksum.
//!
//! ## Functions
//!
//! - [`encode`] / [`encode_with_key`]: command -> obfuscated wire frame
//! - [`decode`]: obfuscated wire frame -> [`RtsCommand`]
//! - [`obfuscate`] / [`deobfuscate`]: the byte chaining on its own
//!
//! ## Limitations
//!
//! - The key byte is not validated on decode; receivers in the field ignore it too.
//! - Only single `My`, `Up` or `Down` presses are accepted from the air.

use bitflags::bitflags;
use thiserror::Error;

use crate::checksum::{hi4, lo4, rts_checksum};
use crate::consts::{REMOTE_ID_MASK, RTS_FRAME_LEN, RTS_PROTOCOL_KEY};

/// A frame as it goes over the air.
pub type RawFrame = [u8; RTS_FRAME_LEN];

bitflags! {
    /// Buttons of an RTS remote. Buttons can be chorded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Button: u8 {
        /// The "My" (stop / favourite position) button.
        const MY = 0b0001;
        /// The "Up" button.
        const UP = 0b0010;
        /// The "Down" button.
        const DOWN = 0b0100;
        /// The "Prog" button on the back of the remote.
        const PROG = 0b1000;
        /// Sun detector on (`My` + `Prog`).
        const SUN_DETECTOR_ON = Self::MY.bits() | Self::PROG.bits();
        /// Sun detector off (`Up` + `Prog`).
        const SUN_DETECTOR_OFF = Self::UP.bits() | Self::PROG.bits();
    }
}

impl Button {
    /// Whether this mask is a single `My`, `Up` or `Down` press, the only masks
    /// accepted from received frames.
    pub fn is_single_press(self) -> bool {
        self == Button::MY || self == Button::UP || self == Button::DOWN
    }
}

#[cfg(feature = "defmt-0-3")]
impl defmt::Format for Button {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Button({=u8:#x})", self.bits())
    }
}

/// A logical RTS command, as carried by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct RtsCommand {
    /// 24-bit remote identity.
    pub remote_id: u32,
    /// Rolling code of the press.
    pub rolling_code: u16,
    /// Buttons pressed.
    pub button: Button,
}

/// Reasons a received frame is not a command for us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum DecodeError {
    /// The checksum nibble does not match the frame contents.
    #[error("checksum mismatch: computed {expected:#x}, frame carried {received:#x}")]
    ChecksumMismatch {
        /// Checksum computed over the de-obfuscated frame.
        expected: u8,
        /// Checksum carried by the frame.
        received: u8,
    },
    /// The button nibble is not a single `My`, `Up` or `Down` press.
    #[error("invalid button mask {0:#x}")]
    InvalidButton(u8),
}

/// Applies the forward byte chain, `frame[i] ^= frame[i - 1]` for `i = 1..=6`.
pub fn obfuscate(frame: &mut RawFrame) {
    for i in 1..RTS_FRAME_LEN {
        frame[i] ^= frame[i - 1];
    }
}

/// Reverses [`obfuscate`]: the same chain applied for `i = 6..=1`.
pub fn deobfuscate(frame: &mut RawFrame) {
    for i in (1..RTS_FRAME_LEN).rev() {
        frame[i] ^= frame[i - 1];
    }
}

/// Builds the plain (not yet obfuscated) frame, checksum included.
pub fn plain_frame(key: u8, remote_id: u32, rolling_code: u16, button: Button) -> RawFrame {
    let remote_id = remote_id & REMOTE_ID_MASK;
    let [_, id_hi, id_mid, id_lo] = remote_id.to_be_bytes();
    let [roll_hi, roll_lo] = rolling_code.to_be_bytes();
    let mut frame = [key, lo4(button.bits()) << 4, roll_hi, roll_lo, id_hi, id_mid, id_lo];
    frame[1] |= rts_checksum(&frame);
    frame
}

/// Encodes a command with the default protocol key.
///
/// See [`encode_with_key`].
pub fn encode(remote_id: u32, rolling_code: u16, button: Button) -> RawFrame {
    encode_with_key(RTS_PROTOCOL_KEY, remote_id, rolling_code, button)
}

/// Encodes a command into an obfuscated wire frame.
///
/// Only the low 24 bits of `remote_id` and the low nibble of `button` are used.
/// Pure and total.
pub fn encode_with_key(key: u8, remote_id: u32, rolling_code: u16, button: Button) -> RawFrame {
    let mut frame = plain_frame(key, remote_id, rolling_code, button);
    obfuscate(&mut frame);
    frame
}

/// Decodes an obfuscated wire frame.
///
/// # Errors
/// - [`DecodeError::ChecksumMismatch`] if the checksum nibble doesn't match
/// - [`DecodeError::InvalidButton`] if the button nibble isn't a single `My`, `Up`
///   or `Down` press
pub fn decode(raw: &RawFrame) -> Result<RtsCommand, DecodeError> {
    let mut msg = *raw;
    deobfuscate(&mut msg);

    let received = lo4(msg[1]);
    msg[1] &= 0xf0;
    let expected = rts_checksum(&msg);
    if expected != received {
        return Err(DecodeError::ChecksumMismatch { expected, received });
    }

    let button = Button::from_bits_retain(hi4(msg[1]));
    if !button.is_single_press() {
        return Err(DecodeError::InvalidButton(button.bits()));
    }

    Ok(RtsCommand {
        remote_id: u32::from_be_bytes([0, msg[4], msg[5], msg[6]]),
        rolling_code: u16::from_be_bytes([msg[2], msg[3]]),
        button,
    })
}
