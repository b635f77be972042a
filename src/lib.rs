//! # somfy-rts
//!
//! A portable, no_std Rust radio engine for Somfy RTS ("Radio Technology Somfy")
//! roller-shutter motors, built around a 433.42 MHz OOK transceiver such as the
//! HopeRF RFM69.
//!
//! The crate covers the part of an RTS bridge that has to be bit-exact and
//! timing-exact with third-party hardware:
//! - the 7-byte RTS frame codec (nibble checksum + byte chaining)
//! - the transmit sequencer (wake pulse, framed burst, timed repeats)
//! - a receive de-duplication buffer that folds the retransmissions of one
//!   button press into a single event
//! - a cross-context command queue, with a worker loop that owns the radio
//!
//! ## Crate features
//! | Feature     | Description |
//! |-------------|-------------|
//! | `std`       | Disables `#![no_std]`, enables `critical-section/std` and [`timer::StdClock`] |
//! | `defmt-0-3` | Uses `defmt` logging |
//! | `log`       | Uses `log` logging |
//!
//! ## Usage
//!
//! One context owns the radio and runs the worker, the other only queues
//! requests and polls for received commands:
//!
//! ```rust,ignore
//! use somfy_rts::{Button, config::RadioConfig, queue::RadioQueue, rfm69::Rfm69, worker::RadioWorker};
//!
//! static RADIO_QUEUE: RadioQueue = RadioQueue::new();
//!
//! // Worker context (second core / thread)
//! let rfm69 = Rfm69::new(spi_device, reset_pin, delay.clone());
//! let mut worker = RadioWorker::new(&RADIO_QUEUE, rfm69, clock, delay, Some(led), None, RadioConfig::default());
//! worker.run();
//!
//! // Radio DIO0 interrupt
//! RADIO_QUEUE.receive_ready();
//!
//! // Main context
//! RADIO_QUEUE.queue_command(0x27962A, 2612, Button::UP, 3);
//! if let Some(cmd) = RADIO_QUEUE.try_read_external_command(clock.now()) { /* ... */ }
//! ```
//!
//! ## Integration Notes
//!
//! - Only the worker may touch the transceiver. Everything shared between the
//!   two contexts goes through [`queue::RadioQueue`], guarded by `critical_section`.
//! - Frame layout and obfuscation must stay byte-exact with deployed motors
//!   and remotes.
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub use critical_section;
pub use heapless;

#[macro_use]
mod logging;

pub(crate) mod checksum;
pub mod config;
pub mod consts;
pub mod frame;
pub mod queue;
pub mod receive;
pub mod remote;
pub mod rfm69;
pub mod sequencer;
pub mod timer;
pub mod transceiver;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use frame::{Button, DecodeError, RtsCommand};
pub use queue::{RadioQueue, Request, WorkerState};
pub use receive::ReceivedCommand;
pub use transceiver::Transceiver;
