//! Transmit sequencer: turns one encoded frame into a timed RTS burst.
//!
//! A burst looks like this on air:
//!
//! ```text
//!  t0           t0+29ms        t0+144ms        t0+283ms        ...
//!  |wake (raw)| |sync3|frame|  |sync8|frame|   |sync8|frame|   (repeat times)
//! ```
//!
//! - The wake pulse is two `0xFF` bytes sent with sync and Manchester coding off, which
//!   the radio turns into a long carrier-on pulse.
//! - The first frame goes out with a short sync word, every repeat with the full one.
//! - All deadlines are absolute and derived from `t0` by addition, so time spent on air
//!   or on the bus never pushes later frames back.
//!
//! The sequencer is not preemptible: once started, the whole burst is sent.

use embedded_hal::delay::DelayNs;

use crate::consts::{
    FIRST_FRAME_DELAY_US, FIRST_REPEAT_DELAY_US, REPEAT_INTERVAL_US, RTS_FRAME_LEN, SYNC_FIRST,
    SYNC_REPEAT, WAKE_PATTERN,
};
use crate::frame::RawFrame;
use crate::timer::{Clock, wait_until};
use crate::transceiver::Transceiver;

/// Sends `frame` once, then `repeat` more times, on the RTS cadence.
///
/// # Arguments
/// - `radio`: The transceiver, already initialised for RTS and idle.
/// - `clock`: Monotonic time source for the burst deadlines.
/// - `delay`: Delay provider used while waiting for each deadline.
/// - `frame`: An obfuscated frame, as returned by [`encode`](crate::frame::encode).
/// - `repeat`: Number of repeats after the first frame. Motors treat 3 as a short
///   press and 12 or more as a long press.
///
/// # Errors
/// Returns the first transceiver error. The rest of the burst is abandoned, since a
/// partial burst with the wrong cadence would be misread by the motor anyway.
pub fn transmit_burst<R, C, D>(
    radio: &mut R,
    clock: &C,
    delay: &mut D,
    frame: &RawFrame,
    repeat: u16,
) -> Result<(), R::Error>
where
    R: Transceiver,
    C: Clock + ?Sized,
    D: DelayNs,
{
    // Wake pulse: raw, no sync, no Manchester
    radio.set_sync_bytes(&[])?;
    radio.set_packet_format(false, WAKE_PATTERN.len() as u8)?;
    let t0 = clock.now();
    radio.transmit_packet(&WAKE_PATTERN)?;

    radio.set_sync_bytes(&SYNC_FIRST)?;
    radio.set_packet_format(true, RTS_FRAME_LEN as u8)?;
    let mut deadline = t0.delayed_by_us(FIRST_FRAME_DELAY_US);
    wait_until(clock, delay, deadline);
    radio.transmit_packet(frame)?;

    radio.set_sync_bytes(&SYNC_REPEAT)?;
    deadline = deadline.delayed_by_us(FIRST_REPEAT_DELAY_US);
    for _ in 0..repeat {
        wait_until(clock, delay, deadline);
        radio.transmit_packet(frame)?;
        deadline = deadline.delayed_by_us(REPEAT_INTERVAL_US);
    }

    Ok(())
}
