//! Monotonic time and absolute-deadline waits.
//!
//! RTS receivers expect every repeat of a burst on a fixed cadence, so the transmit
//! sequencer never sleeps for a relative duration. Instead it computes absolute
//! deadlines once, advances them additively, and waits until each one through
//! [`wait_until`]. Codec, queue and bus overhead then can't accumulate as drift.
//!
//! Contains:
//! - [`Instant`]: a monotonic timestamp in microseconds
//! - [`Clock`]: the monotonic time source the engine reads
//! - [`wait_until`]: a deadline wait built on `embedded_hal::delay::DelayNs`
//! - [`StdClock`]: a `std::time::Instant` backed clock (feature `std`)

mod delay;
pub use delay::*;

/// A point on a monotonic timeline, with microsecond resolution.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, Debug, Hash)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Instant(u64);

impl Instant {
    /// The origin of the timeline.
    pub const ZERO: Instant = Instant(0);

    /// Creates an instant `us` microseconds after the origin.
    pub const fn from_micros(us: u64) -> Self {
        Instant(us)
    }

    /// Microseconds since the origin.
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// The instant `us` microseconds after this one.
    pub const fn delayed_by_us(self, us: u64) -> Self {
        Instant(self.0.saturating_add(us))
    }

    /// Microseconds elapsed between `earlier` and `self`, or 0 if `earlier` is later.
    pub const fn micros_since(self, earlier: Instant) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// A monotonic time source.
///
/// Implementations must never go backwards. On bare metal this is typically a
/// free-running hardware timer.
pub trait Clock {
    /// The current time.
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// A [`Clock`] backed by `std::time::Instant`, counting from its creation.
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Creates a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant(self.origin.elapsed().as_micros() as u64)
    }
}
