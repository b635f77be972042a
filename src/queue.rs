//! Cross-context command queue.
//!
//! [`RadioQueue`] is the only state shared between the main context and the worker
//! context that owns the radio:
//!
//! ```text
//!  main context ── queue_command / queue_receive ──▶ requests ──▶ RadioWorker ──▶ radio
//!               ◀── try_read_external_command ──── received ◀──┘
//!  DIO0 ISR     ── receive_ready ─────────────────▶ flag ───────▶ RadioWorker
//! ```
//!
//! Every piece of shared state lives in a `critical_section::Mutex`, and critical
//! sections only ever copy values or do index arithmetic; no I/O runs while one is
//! held. [`RadioQueue::new`] is `const`, so the queue can live in a `static` shared
//! by both cores.
//!
//! ## Enqueue semantics
//!
//! - `Transmit` and `ArmReceive` requests are best-effort: they fail fast with
//!   `false` when the queue is full.
//! - `Shutdown` waits for room, and the caller then waits for the worker to pick it
//!   up, so no earlier request is lost and no burst is cut short.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::fmt;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use heapless::Deque;

use crate::consts::{COMMAND_QUEUE_LEN, SHUTDOWN_POLL_MS};
use crate::frame::{Button, RtsCommand};
use crate::receive::{ReceiveBuffer, ReceivedCommand, RecordOutcome};
use crate::timer::Instant;

/// A request from the main context to the radio worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Request {
    /// Send a command burst.
    Transmit {
        /// 24-bit remote identity to send as.
        remote_id: u32,
        /// Rolling code to put in the frame.
        rolling_code: u16,
        /// Buttons to press.
        button: Button,
        /// Number of repeats after the first frame.
        repeat: u16,
    },
    /// (Re-)arm continuous reception.
    ArmReceive,
    /// Stop the worker once everything queued before this has run.
    Shutdown,
}

/// Operational state of the radio worker.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum WorkerState {
    /// Listening, waiting for the next request or received frame.
    #[default]
    Idle,
    /// Running a transmit burst. Not preemptible.
    Transmitting,
    /// A `Shutdown` request was serviced. Terminal.
    ShuttingDown,
}

/// Shared request queue, receive buffer and worker status.
pub struct RadioQueue {
    requests: Mutex<RefCell<Deque<Request, COMMAND_QUEUE_LEN>>>,
    received: Mutex<RefCell<ReceiveBuffer>>,
    receive_ready: Mutex<Cell<bool>>,
    shutdown_requested: Mutex<Cell<bool>>,
    state: Mutex<Cell<WorkerState>>,
}

impl RadioQueue {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            requests: Mutex::new(RefCell::new(Deque::new())),
            received: Mutex::new(RefCell::new(ReceiveBuffer::new())),
            receive_ready: Mutex::new(Cell::new(false)),
            shutdown_requested: Mutex::new(Cell::new(false)),
            state: Mutex::new(Cell::new(WorkerState::Idle)),
        }
    }

    /// Queues a command burst for transmission.
    ///
    /// # Returns
    /// - `true`: the request was queued
    /// - `false`: the queue is full or shutting down; the command was dropped and it
    ///   is up to the caller whether to retry later or give up
    pub fn queue_command(&self, remote_id: u32, rolling_code: u16, button: Button, repeat: u16) -> bool {
        self.try_push(Request::Transmit {
            remote_id,
            rolling_code,
            button,
            repeat,
        })
    }

    /// Asks the worker to re-arm reception.
    ///
    /// Same failure semantics as [`queue_command`](Self::queue_command).
    pub fn queue_receive(&self) -> bool {
        self.try_push(Request::ArmReceive)
    }

    fn try_push(&self, request: Request) -> bool {
        let queued = critical_section::with(|cs| {
            if self.shutdown_requested.borrow(cs).get() {
                return false;
            }
            self.requests.borrow_ref_mut(cs).push_back(request).is_ok()
        });
        if !queued {
            warn!("Radio queue full or stopping, dropped {:?}", request);
        }
        queued
    }

    /// Non-blocking form of [`request_shutdown`](Self::request_shutdown).
    ///
    /// # Returns
    /// - `Ok(())`: the `Shutdown` request is queued (or already was)
    /// - `Err(nb::Error::WouldBlock)`: the queue is full, try again
    pub fn try_request_shutdown(&self) -> nb::Result<(), Infallible> {
        critical_section::with(|cs| {
            let requested = self.shutdown_requested.borrow(cs);
            if requested.get() {
                return Ok(());
            }
            match self.requests.borrow_ref_mut(cs).push_back(Request::Shutdown) {
                Ok(()) => {
                    requested.set(true);
                    Ok(())
                }
                Err(_) => Err(nb::Error::WouldBlock),
            }
        })
    }

    /// Queues a `Shutdown` request, waiting for room in the queue if necessary.
    ///
    /// Follow with [`await_drained`](Self::await_drained) before treating the worker as
    /// stopped.
    pub fn request_shutdown<D: DelayNs>(&self, delay: &mut D) {
        while let Err(nb::Error::WouldBlock) = self.try_request_shutdown() {
            delay.delay_ms(SHUTDOWN_POLL_MS);
        }
    }

    /// Non-blocking form of [`await_drained`](Self::await_drained).
    ///
    /// # Returns
    /// - `Ok(())`: the worker has consumed the `Shutdown` request
    /// - `Err(nb::Error::WouldBlock)`: requests are still pending
    pub fn poll_drained(&self) -> nb::Result<(), Infallible> {
        if self.state() == WorkerState::ShuttingDown {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Blocks until the worker has run everything queued before the `Shutdown`
    /// request and stopped.
    ///
    /// There is no timeout: shutdown only happens once, on a controlled restart, and a
    /// burst already on air is always allowed to finish.
    pub fn await_drained<D: DelayNs>(&self, delay: &mut D) {
        while let Err(nb::Error::WouldBlock) = self.poll_drained() {
            delay.delay_ms(SHUTDOWN_POLL_MS);
        }
    }

    /// Takes the oldest received command, once its retransmissions have settled.
    ///
    /// `now` must come from the same clock the worker stamps frames with.
    pub fn try_read_external_command(&self, now: Instant) -> Option<ReceivedCommand> {
        critical_section::with(|cs| self.received.borrow_ref_mut(cs).take_settled(now))
    }

    /// Signals that the radio has a packet ready. Call from the receive interrupt.
    pub fn receive_ready(&self) {
        critical_section::with(|cs| self.receive_ready.borrow(cs).set(true));
    }

    /// Current state of the worker.
    pub fn state(&self) -> WorkerState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    /// Number of requests waiting for the worker.
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.requests.borrow_ref(cs).len())
    }

    /// Number of received presses not yet read.
    pub fn received_len(&self) -> usize {
        critical_section::with(|cs| self.received.borrow_ref(cs).len())
    }

    pub(crate) fn pop(&self) -> Option<Request> {
        critical_section::with(|cs| self.requests.borrow_ref_mut(cs).pop_front())
    }

    pub(crate) fn take_receive_ready(&self) -> bool {
        critical_section::with(|cs| self.receive_ready.borrow(cs).replace(false))
    }

    pub(crate) fn record_received(&self, command: RtsCommand, now: Instant) -> RecordOutcome {
        critical_section::with(|cs| self.received.borrow_ref_mut(cs).record(command, now))
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        critical_section::with(|cs| self.state.borrow(cs).set(state));
    }
}

impl Default for RadioQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RadioQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadioQueue")
            .field("state", &self.state())
            .field("pending", &self.pending())
            .field("received", &self.received_len())
            .finish()
    }
}
