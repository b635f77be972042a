use super::{Clock, Instant};
use embedded_hal::delay::DelayNs;

/// Longest single sleep taken by [`wait_until`], in microseconds.
///
/// Keeping the slices short bounds how far a coarse `DelayNs` can overshoot.
pub const MAX_WAIT_SLICE_US: u64 = 1_000;

/// Blocks until `clock` reaches `deadline`.
///
/// The remaining time is recomputed from the absolute deadline after every slice,
/// so an inaccurate delay provider never accumulates error across calls. Returns
/// immediately if the deadline has already passed.
///
/// # Arguments
/// - `clock`: The monotonic time source the deadline refers to.
/// - `delay`: A delay provider, typically from the HAL, used to sleep between checks.
/// - `deadline`: The absolute instant to wait for.
pub fn wait_until<C, D>(clock: &C, delay: &mut D, deadline: Instant)
where
    C: Clock + ?Sized,
    D: DelayNs,
{
    loop {
        let remaining = deadline.micros_since(clock.now());
        if remaining == 0 {
            return;
        }
        delay.delay_us(remaining.min(MAX_WAIT_SLICE_US) as u32);
    }
}
