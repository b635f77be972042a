//! Logging shims.
//!
//! Diagnostics go to `defmt` when the `defmt-0-3` feature is enabled, otherwise to the
//! `log` facade when `log` is enabled. With neither, the macros compile to nothing but
//! still type-check their arguments, so values that are only ever logged don't trip the
//! `unused` lints.

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt-0-3")]
        ::defmt::debug!($($arg)*);

        #[cfg(all(feature = "log", not(feature = "defmt-0-3")))]
        ::log::debug!($($arg)*);

        #[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt-0-3")]
        ::defmt::info!($($arg)*);

        #[cfg(all(feature = "log", not(feature = "defmt-0-3")))]
        ::log::info!($($arg)*);

        #[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt-0-3")]
        ::defmt::warn!($($arg)*);

        #[cfg(all(feature = "log", not(feature = "defmt-0-3")))]
        ::log::warn!($($arg)*);

        #[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

/// Wraps a `Debug` value so it can be logged with `{:?}` under either backend.
#[cfg(feature = "defmt-0-3")]
pub(crate) fn debug_fmt<T: core::fmt::Debug + ?Sized>(value: &T) -> defmt::Debug2Format<'_, T> {
    defmt::Debug2Format(value)
}

/// Wraps a `Debug` value so it can be logged with `{:?}` under either backend.
#[cfg(not(feature = "defmt-0-3"))]
pub(crate) fn debug_fmt<T: core::fmt::Debug + ?Sized>(value: &T) -> &T {
    value
}
