//! Constants used across the RTS protocol implementation.
//!
//! This module defines the protocol-wide constants shared by the frame codec,
//! the transmit sequencer, the receive path and the command queue.
//!
//! ## Key Concepts
//!
//! - **Frame**: 7 logical bytes (key, button + checksum, rolling code, remote id).
//! - **Sync patterns**: the receiver locks onto a different sync word for the first
//!   frame of a burst and for its repeats.
//! - **Burst timing**: genuine remotes retransmit on a fixed cadence; motors rely on it
//!   both to accept a command and to measure how long a button is held.
//! - **Capacities**: sizes of the request queue and of the receive de-dup buffer.
//!
//! Changing any of the wire-level values breaks compatibility with deployed motors
//! and remotes.

/// Carrier frequency of RTS equipment, in MHz.
pub const RTS_FREQUENCY_MHZ: f64 = 433.42;

/// Width of one RTS symbol (half of a Manchester bit), in microseconds.
pub const RTS_SYMBOL_WIDTH_US: u16 = 640;

/// Length (in bytes) of an RTS frame, before any radio-level padding.
pub const RTS_FRAME_LEN: usize = 7;

/// Fixed "key" byte at offset 0 of every frame sent by this engine.
pub const RTS_PROTOCOL_KEY: u8 = 0x50;

/// Key byte used by earlier deployments of this firmware.
///
/// Receivers have been seen to accept either; confirm against the target motors
/// before switching [`RadioConfig::protocol_key`](crate::config::RadioConfig::protocol_key).
pub const RTS_PROTOCOL_KEY_LEGACY: u8 = 0xA7;

/// Mask for the 24 significant bits of a remote identity.
pub const REMOTE_ID_MASK: u32 = 0x00ff_ffff;

/// Raw, unframed burst sent ahead of the first frame to wake the motor's receiver.
pub const WAKE_PATTERN: [u8; 2] = [0xff, 0xff];

/// Sync word sent before the repeats of a burst.
pub const SYNC_REPEAT: [u8; 8] = [0xf0, 0xf0, 0xf0, 0xf0, 0xf0, 0xf0, 0xf0, 0xfe];

/// Sync word sent before the first frame of a burst (the tail of [`SYNC_REPEAT`]).
pub const SYNC_FIRST: [u8; 3] = [0xf0, 0xf0, 0xfe];

/// Sync word the receiver listens for.
///
/// Offset by one bit from the transmitted pattern: the sync pulses of genuine
/// remotes don't match the symbol width of the frame body exactly.
pub const SYNC_RECEIVE: [u8; 3] = [0xe1, 0xe1, 0xfe];

/// Delay from the start of the wake pulse to the first frame, in microseconds.
pub const FIRST_FRAME_DELAY_US: u64 = 29_000;

/// Delay from the first frame to the first repeat, in microseconds.
pub const FIRST_REPEAT_DELAY_US: u64 = 115_000;

/// Interval between consecutive repeats, in microseconds.
pub const REPEAT_INTERVAL_US: u64 = 139_000;

/// Capacity of the producer -> worker request queue.
pub const COMMAND_QUEUE_LEN: usize = 16;

/// Capacity of the receive de-duplication buffer.
pub const RECEIVE_BUFFER_LEN: usize = 8;

/// Time without a matching retransmission after which a received command is settled.
pub const DEBOUNCE_WINDOW_US: u64 = 250_000;

/// Repeat count for a short button press.
pub const SHORT_PRESS: u16 = 3;

/// Repeat count for a long button press (e.g. to program a motor).
pub const LONG_PRESS: u16 = 12;

/// How long the worker sleeps between polls when it has nothing to do.
pub const IDLE_POLL_US: u32 = 500;

/// How often a producer blocked on shutdown re-checks the queue, in milliseconds.
pub const SHUTDOWN_POLL_MS: u32 = 10;
