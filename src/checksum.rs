use crate::consts::RTS_FRAME_LEN;

/// Folds a plain (un-chained) frame into the 4-bit RTS checksum.
///
/// The nibble in the low half of byte 1 must already be zero.
pub(crate) fn rts_checksum(frame: &[u8; RTS_FRAME_LEN]) -> u8 {
    frame.iter().fold(0, |acc, &b| acc ^ b ^ (b >> 4)) & 0x0f
}

pub(crate) fn lo4(x: u8) -> u8 {
    x & 0x0f
}

pub(crate) fn hi4(x: u8) -> u8 {
    x >> 4
}
