//! Receive de-duplication buffer.
//!
//! A single press on an RTS remote is transmitted 4 to 7 times, and a held button keeps
//! retransmitting the identical frame. [`ReceiveBuffer`] folds those retransmissions
//! into one [`ReceivedCommand`] whose `repeat` counts the extra copies, and only hands
//! a command out once no copy has arrived for the debounce window, so readers never
//! see a partial repeat count.
//!
//! The buffer itself is not synchronised. [`RadioQueue`](crate::queue::RadioQueue)
//! keeps it behind a `critical_section::Mutex` shared by the worker (writer) and the
//! main context (reader).

use heapless::Deque;

use crate::consts::{DEBOUNCE_WINDOW_US, RECEIVE_BUFFER_LEN};
use crate::frame::{Button, RtsCommand};
use crate::timer::Instant;

/// A debounced command received from a physical remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct ReceivedCommand {
    /// 24-bit identity of the remote that sent it.
    pub remote_id: u32,
    /// Rolling code carried by the frames.
    pub rolling_code: u16,
    /// Button pressed.
    pub button: Button,
    /// Number of retransmissions seen after the first frame.
    pub repeat: u16,
}

impl ReceivedCommand {
    fn is_same_press(&self, command: &RtsCommand) -> bool {
        self.remote_id == command.remote_id
            && self.rolling_code == command.rolling_code
            && self.button == command.button
    }
}

#[derive(Debug, Clone, Copy)]
struct ReceivedRecord {
    command: ReceivedCommand,
    last_seen: Instant,
}

/// What [`ReceiveBuffer::record`] did with a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RecordOutcome {
    /// A new press was appended.
    Appended,
    /// The frame repeated the most recent press; its count was bumped.
    Repeated,
    /// The buffer was full and the frame was discarded.
    Dropped,
}

/// Bounded FIFO of received presses, coalescing retransmissions.
#[derive(Debug)]
pub struct ReceiveBuffer {
    records: Deque<ReceivedRecord, RECEIVE_BUFFER_LEN>,
    debounce_us: u64,
}

impl ReceiveBuffer {
    /// Creates an empty buffer with the standard debounce window.
    pub const fn new() -> Self {
        Self::with_debounce(DEBOUNCE_WINDOW_US)
    }

    /// Creates an empty buffer with a custom debounce window, in microseconds.
    pub const fn with_debounce(debounce_us: u64) -> Self {
        Self {
            records: Deque::new(),
            debounce_us,
        }
    }

    /// Records a decoded frame received at `now`.
    ///
    /// # Behavior
    /// - If the most recently written press is the same `(remote, rolling code, button)`,
    ///   its repeat count is bumped and its last-seen time refreshed.
    /// - Otherwise a new press with `repeat = 0` is appended.
    /// - If there is no room, the frame is dropped and the buffered presses, which may
    ///   still be debouncing, are left untouched.
    pub fn record(&mut self, command: RtsCommand, now: Instant) -> RecordOutcome {
        if let Some(last) = self.records.back_mut() {
            if last.command.is_same_press(&command) {
                last.command.repeat = last.command.repeat.saturating_add(1);
                last.last_seen = now;
                return RecordOutcome::Repeated;
            }
        }

        let record = ReceivedRecord {
            command: ReceivedCommand {
                remote_id: command.remote_id,
                rolling_code: command.rolling_code,
                button: command.button,
                repeat: 0,
            },
            last_seen: now,
        };
        match self.records.push_back(record) {
            Ok(()) => RecordOutcome::Appended,
            Err(_) => RecordOutcome::Dropped,
        }
    }

    /// Removes and returns the oldest press, once it has settled.
    ///
    /// # Returns
    /// - `Some(command)` if the oldest press has seen no retransmission for at least
    ///   the debounce window
    /// - `None` if the buffer is empty or more retransmissions may still be inbound
    pub fn take_settled(&mut self, now: Instant) -> Option<ReceivedCommand> {
        let oldest = self.records.front()?;
        if now.micros_since(oldest.last_seen) < self.debounce_us {
            return None;
        }
        self.records.pop_front().map(|record| record.command)
    }

    /// Number of buffered presses.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no press is buffered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a new press would be dropped.
    pub fn is_full(&self) -> bool {
        self.records.is_full()
    }

    /// Iterates over the buffered presses, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ReceivedCommand> {
        self.records.iter().map(|record| &record.command)
    }
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}
