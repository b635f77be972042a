//! Radio worker: the only context that touches the transceiver.
//!
//! [`RadioWorker`] owns the radio, a clock and a delay provider, and serves one
//! [`RadioQueue`]. Each [`step`](RadioWorker::step) does at most one unit of work:
//!
//! 1. If the receive interrupt fired, read the packet, decode it and record it.
//! 2. Otherwise pop the next request and run it to completion. A transmit burst is
//!    never interleaved with another request.
//! 3. With nothing to do, sleep briefly.
//!
//! After every request the radio is put back into receive mode, so the bridge keeps
//! hearing physical remotes between its own transmissions.
//!
//! ## Status indicator
//!
//! An optional output pin (typically an LED) is driven "on" for the duration of each
//! burst, and can be inverted for active-low wiring.

use core::fmt::Debug;
use core::ops::ControlFlow;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::RadioConfig;
use crate::consts::{IDLE_POLL_US, RTS_FRAME_LEN, SYNC_RECEIVE};
use crate::frame::{Button, RawFrame, decode, encode_with_key};
use crate::logging::debug_fmt;
use crate::queue::{RadioQueue, Request, WorkerState};
use crate::receive::RecordOutcome;
use crate::sequencer::transmit_burst;
use crate::timer::Clock;
use crate::transceiver::Transceiver;

/// Serves a [`RadioQueue`] with exclusive use of a transceiver.
#[derive(Debug)]
pub struct RadioWorker<'q, R, C, D, IND>
where
    R: Transceiver,
    C: Clock,
    D: DelayNs,
    IND: OutputPin,
{
    queue: &'q RadioQueue,
    radio: R,
    clock: C,
    delay: D,
    /// Status indicator pin, on while a burst is on air
    pub indicator: Option<IND>,
    indicator_inverted: bool,
    config: RadioConfig,

    /// Bursts sent in full.
    pub tx_good: u32,
    /// Bursts abandoned because of a transceiver error.
    pub tx_bad: u32,
    /// Received frames that started a new press.
    pub rx_good: u32,
    /// Received frames that failed to decode.
    pub rx_bad: u32,
    /// Received presses lost because the receive buffer was full.
    pub rx_dropped: u32,
}

impl<'q, R, C, D, IND> RadioWorker<'q, R, C, D, IND>
where
    R: Transceiver,
    C: Clock,
    D: DelayNs,
    IND: OutputPin,
{
    /// Creates a worker. Nothing is sent to the radio until [`start`](Self::start).
    ///
    /// # Arguments
    /// - `queue`: The queue to serve. Usually a `static`.
    /// - `radio`: The transceiver. The worker has exclusive use of it from now on.
    /// - `clock`: Monotonic time source, shared with whoever reads received commands.
    /// - `delay`: Delay provider for burst timing and idle polling.
    /// - `indicator`: Optional status pin driven during bursts.
    /// - `indicator_inverted`: Whether the indicator is active-low (On = LOW, Off = HIGH).
    /// - `config`: Frequency, symbol width and protocol key.
    pub fn new(
        queue: &'q RadioQueue,
        radio: R,
        clock: C,
        delay: D,
        indicator: Option<IND>,
        indicator_inverted: Option<bool>,
        config: RadioConfig,
    ) -> Self {
        Self {
            queue,
            radio,
            clock,
            delay,
            indicator,
            indicator_inverted: indicator_inverted.unwrap_or(false),
            config,
            tx_good: 0,
            tx_bad: 0,
            rx_good: 0,
            rx_bad: 0,
            rx_dropped: 0,
        }
    }

    /// Resets and configures the radio, then starts listening.
    ///
    /// Transceiver errors are logged; the worker carries on regardless, since the
    /// requests it serves have nowhere else to go.
    pub fn start(&mut self) {
        self.queue.set_state(WorkerState::Idle);
        report(self.radio.reset(), "reset");
        report(self.radio.initialize(), "initialize");
        report(
            self.radio.set_symbol_width(self.config.symbol_width_us),
            "set symbol width",
        );
        report(
            self.radio.set_frequency(self.config.frequency_mhz),
            "set frequency",
        );

        if let (Ok(version), Ok(bit_rate), Ok(frequency)) = (
            self.radio.version(),
            self.radio.bit_rate(),
            self.radio.frequency(),
        ) {
            info!(
                "Radio version {:#x} ready at {} MHz, {} bps",
                version, frequency, bit_rate
            );
        }

        self.arm_receive();
    }

    /// Starts the worker and serves requests until a `Shutdown` request is handled.
    pub fn run(&mut self) {
        self.start();
        while self.step().is_continue() {}
    }

    /// Performs at most one unit of work.
    ///
    /// # Returns
    /// - `ControlFlow::Continue(())`: call again
    /// - `ControlFlow::Break(())`: the worker has shut down; the radio is in standby
    pub fn step(&mut self) -> ControlFlow<()> {
        if self.queue.state() == WorkerState::ShuttingDown {
            return ControlFlow::Break(());
        }

        if self.queue.take_receive_ready() {
            self.receive();
            return ControlFlow::Continue(());
        }

        match self.queue.pop() {
            Some(Request::Transmit {
                remote_id,
                rolling_code,
                button,
                repeat,
            }) => {
                self.transmit(remote_id, rolling_code, button, repeat);
                ControlFlow::Continue(())
            }
            Some(Request::ArmReceive) => {
                self.arm_receive();
                ControlFlow::Continue(())
            }
            Some(Request::Shutdown) => {
                report(self.radio.standby(), "standby");
                self.queue.set_state(WorkerState::ShuttingDown);
                info!("Radio worker stopped");
                ControlFlow::Break(())
            }
            None => {
                self.delay.delay_us(IDLE_POLL_US);
                ControlFlow::Continue(())
            }
        }
    }

    /// The transceiver, for inspection.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Consumes the worker, handing back the transceiver and the indicator pin.
    pub fn release(self) -> (R, Option<IND>) {
        (self.radio, self.indicator)
    }

    fn transmit(&mut self, remote_id: u32, rolling_code: u16, button: Button, repeat: u16) {
        self.queue.set_state(WorkerState::Transmitting);
        debug!(
            "Sending {:?} as remote {:#x}, rolling code {}, {} repeats",
            button, remote_id, rolling_code, repeat
        );

        let frame: RawFrame =
            encode_with_key(self.config.protocol_key, remote_id, rolling_code, button);
        report(self.radio.standby(), "standby");

        self.write_indicator(true);
        match transmit_burst(&mut self.radio, &self.clock, &mut self.delay, &frame, repeat) {
            Ok(()) => self.tx_good = self.tx_good.wrapping_add(1),
            Err(e) => {
                self.tx_bad = self.tx_bad.wrapping_add(1);
                warn!("Burst for remote {:#x} abandoned: {:?}", remote_id, debug_fmt(&e));
            }
        }
        self.write_indicator(false);

        report(self.radio.standby(), "standby");
        // DIO0 doubles as PacketSent in TX mode; those edges are not received packets.
        let _ = self.queue.take_receive_ready();
        self.arm_receive();
        self.queue.set_state(WorkerState::Idle);
    }

    fn receive(&mut self) {
        let mut raw: RawFrame = [0; RTS_FRAME_LEN];
        match self.radio.receive_packet(&mut raw) {
            Ok(()) => self.record(&raw),
            Err(e) => warn!("Reading received packet failed: {:?}", debug_fmt(&e)),
        }
        self.arm_receive();
    }

    fn record(&mut self, raw: &RawFrame) {
        let command = match decode(raw) {
            Ok(command) => command,
            Err(e) => {
                self.rx_bad = self.rx_bad.wrapping_add(1);
                debug!("Ignoring received frame: {}", e);
                return;
            }
        };

        match self.queue.record_received(command, self.clock.now()) {
            RecordOutcome::Appended => {
                self.rx_good = self.rx_good.wrapping_add(1);
                info!(
                    "Received {:?} from remote {:#x}, rolling code {}",
                    command.button, command.remote_id, command.rolling_code
                );
            }
            RecordOutcome::Repeated => {}
            RecordOutcome::Dropped => {
                self.rx_dropped = self.rx_dropped.wrapping_add(1);
                warn!(
                    "Receive buffer full, dropped press from remote {:#x}",
                    command.remote_id
                );
            }
        }
    }

    fn arm_receive(&mut self) {
        report(self.radio.set_sync_bytes(&SYNC_RECEIVE), "set sync bytes");
        report(
            self.radio.set_packet_format(true, RTS_FRAME_LEN as u8),
            "set packet format",
        );
        report(self.radio.enable_receive(), "enable receive");
    }

    fn write_indicator(&mut self, on: bool) {
        let state = if self.indicator_inverted { !on } else { on };
        if let Some(ref mut pin) = self.indicator {
            let _ = if state { pin.set_high() } else { pin.set_low() };
        }
    }
}

fn report<E: Debug>(result: Result<(), E>, operation: &str) {
    if let Err(e) = result {
        warn!("Radio {} failed: {:?}", operation, debug_fmt(&e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{RTS_FREQUENCY_MHZ, RTS_PROTOCOL_KEY_LEGACY, SYNC_REPEAT};
    use crate::frame::encode;
    use crate::testing::{RadioEvent, RecordingRadio, SimClock};
    use crate::timer::Instant;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    type TestWorker<'q, 'c> = RadioWorker<'q, RecordingRadio<'c>, &'c SimClock, &'c SimClock, PinMock>;

    fn worker<'q, 'c>(
        queue: &'q RadioQueue,
        clock: &'c SimClock,
        indicator: Option<PinMock>,
        inverted: Option<bool>,
    ) -> TestWorker<'q, 'c> {
        RadioWorker::new(
            queue,
            RecordingRadio::new(clock),
            clock,
            clock,
            indicator,
            inverted,
            RadioConfig::default(),
        )
    }

    fn ms(ms: u64) -> Instant {
        Instant::from_micros(ms * 1_000)
    }

    fn armed_receive() -> Vec<RadioEvent> {
        vec![
            RadioEvent::Sync(SYNC_RECEIVE.to_vec()),
            RadioEvent::Format {
                manchester: true,
                len: 7,
            },
            RadioEvent::EnableReceive,
        ]
    }

    #[test]
    fn test_start_configures_and_arms_radio() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);

        worker.start();

        let mut expected = vec![
            RadioEvent::Reset,
            RadioEvent::Initialize,
            RadioEvent::SymbolWidth(640),
            RadioEvent::Frequency(RTS_FREQUENCY_MHZ),
        ];
        expected.extend(armed_receive());
        assert_eq!(worker.radio().events, expected);
        assert_eq!(queue.state(), WorkerState::Idle);
    }

    #[test]
    fn test_idle_step_sleeps() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);

        assert_eq!(worker.step(), ControlFlow::Continue(()));
        assert_eq!(clock.now(), Instant::from_micros(IDLE_POLL_US as u64));
        assert!(worker.radio().events.is_empty());
    }

    #[test]
    fn test_transmit_request_sends_burst_and_rearms() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);
        assert!(queue.queue_command(0x27962a, 2612, Button::UP, 3));

        assert_eq!(worker.step(), ControlFlow::Continue(()));

        let frame = encode(0x27962a, 2612, Button::UP).to_vec();
        let sent = worker.radio().transmissions();
        assert_eq!(sent.len(), 5);
        assert!(sent[1..].iter().all(|(_, bytes)| *bytes == frame));
        assert!(worker.radio().events.ends_with(&armed_receive()));
        assert_eq!(worker.tx_good, 1);
        assert_eq!(queue.state(), WorkerState::Idle);
    }

    #[test]
    fn test_packet_sent_edges_do_not_trigger_a_read() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);
        worker.radio.notify = Some(&queue);
        assert!(queue.queue_command(0x27962a, 2612, Button::DOWN, 2));

        assert_eq!(worker.step(), ControlFlow::Continue(()));
        let events = worker.radio().events.len();
        assert!(!worker.radio().events.contains(&RadioEvent::Receive));

        let before = clock.now();
        assert_eq!(worker.step(), ControlFlow::Continue(()));
        assert_eq!(worker.radio().events.len(), events);
        assert_eq!(clock.now(), before.delayed_by_us(IDLE_POLL_US as u64));
        assert_eq!(worker.rx_bad, 0);
    }

    #[test]
    fn test_bursts_never_interleave() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);
        worker.radio.airtime_us = 20_000;
        assert!(queue.queue_command(1, 10, Button::UP, 3));
        assert!(queue.queue_command(2, 20, Button::DOWN, 3));
        queue.request_shutdown(&mut &clock);

        worker.run();

        let sent = worker.radio().transmissions();
        assert_eq!(sent.len(), 10);
        let first = encode(1, 10, Button::UP).to_vec();
        let second = encode(2, 20, Button::DOWN).to_vec();
        assert!(sent[1..5].iter().all(|(_, bytes)| *bytes == first));
        assert_eq!(sent[5].1, vec![0xff, 0xff]);
        assert!(sent[6..].iter().all(|(_, bytes)| *bytes == second));
        // The second wake pulse starts only once the last repeat of the first burst ended
        assert!(sent[5].0 >= sent[4].0.delayed_by_us(20_000));
        assert_eq!(worker.tx_good, 2);
        assert_eq!(queue.state(), WorkerState::ShuttingDown);
    }

    #[test]
    fn test_transmit_uses_configured_key() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = RadioWorker::<_, _, _, PinMock>::new(
            &queue,
            RecordingRadio::new(&clock),
            &clock,
            &clock,
            None,
            None,
            RadioConfig {
                protocol_key: RTS_PROTOCOL_KEY_LEGACY,
                ..RadioConfig::default()
            },
        );
        assert!(queue.queue_command(0x27962a, 2612, Button::UP, 0));

        let _ = worker.step();

        let sent = worker.radio().transmissions();
        assert_eq!(sent[1].1, vec![0xa7, 0x87, 0x8d, 0xb9, 0x9e, 0x08, 0x22]);
    }

    #[test]
    fn test_failed_burst_is_counted() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);
        worker.radio.fail_transmit = true;
        assert!(queue.queue_command(1, 1, Button::MY, 3));

        assert_eq!(worker.step(), ControlFlow::Continue(()));

        assert_eq!(worker.tx_good, 0);
        assert_eq!(worker.tx_bad, 1);
        assert!(worker.radio().events.ends_with(&armed_receive()));
        assert_eq!(queue.state(), WorkerState::Idle);
    }

    #[test]
    fn test_received_frames_are_recorded_once() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);
        let frame = encode(0x27962a, 2612, Button::DOWN);

        for _ in 0..4 {
            worker.radio.inbox.push_back(frame);
            queue.receive_ready();
            let _ = worker.step();
            clock.advance_us(30_000);
        }

        assert_eq!(worker.rx_good, 1);
        assert_eq!(queue.received_len(), 1);
        assert_eq!(queue.try_read_external_command(clock.now()), None);

        let cmd = queue.try_read_external_command(ms(400));
        assert_eq!(
            cmd.map(|c| (c.remote_id, c.rolling_code, c.button, c.repeat)),
            Some((0x27962a, 2612, Button::DOWN, 3))
        );
        // Re-armed after every packet
        let rearms = worker
            .radio()
            .events
            .iter()
            .filter(|e| **e == RadioEvent::EnableReceive)
            .count();
        assert_eq!(rearms, 4);
    }

    #[test]
    fn test_corrupt_frames_are_ignored() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);
        let mut frame = encode(0x27962a, 2612, Button::UP);
        frame[6] ^= 0x01;
        worker.radio.inbox.push_back(frame);
        // A valid checksum over a Prog press
        worker.radio.inbox.push_back(encode(1, 1, Button::PROG));

        for _ in 0..2 {
            queue.receive_ready();
            let _ = worker.step();
        }

        assert_eq!(worker.rx_bad, 2);
        assert_eq!(worker.rx_good, 0);
        assert_eq!(queue.received_len(), 0);
    }

    #[test]
    fn test_full_receive_buffer_drops_press() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);

        for code in 0..9u16 {
            worker.radio.inbox.push_back(encode(0x123456, code, Button::MY));
            queue.receive_ready();
            let _ = worker.step();
        }

        assert_eq!(worker.rx_good, 8);
        assert_eq!(worker.rx_dropped, 1);
        assert_eq!(queue.received_len(), 8);
    }

    #[test]
    fn test_receive_is_serviced_before_requests() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);
        assert!(queue.queue_command(1, 1, Button::UP, 0));
        worker.radio.inbox.push_back(encode(2, 2, Button::DOWN));
        queue.receive_ready();

        let _ = worker.step();

        assert!(worker.radio().transmissions().is_empty());
        assert_eq!(queue.received_len(), 1);
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_shutdown_drains_queue_first() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);
        assert!(queue.queue_command(1, 1, Button::UP, 0));
        assert!(queue.queue_receive());
        queue.request_shutdown(&mut &clock);
        assert!(!queue.queue_command(2, 2, Button::UP, 0));

        assert_eq!(worker.step(), ControlFlow::Continue(()));
        assert_eq!(queue.poll_drained(), Err(nb::Error::WouldBlock));
        assert_eq!(worker.step(), ControlFlow::Continue(()));
        assert_eq!(worker.step(), ControlFlow::Break(()));

        assert_eq!(queue.poll_drained(), Ok(()));
        assert_eq!(worker.radio().events.last(), Some(&RadioEvent::Standby));
        assert_eq!(worker.radio().transmissions().len(), 2);
        // Stays stopped
        assert_eq!(worker.step(), ControlFlow::Break(()));
    }

    #[test]
    fn test_indicator_follows_burst() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let led = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let mut worker = worker(&queue, &clock, Some(led), Some(false));
        assert!(queue.queue_command(1, 1, Button::UP, 1));

        let _ = worker.step();

        let (_, led) = worker.release();
        let _ = led.map(|mut led| led.done());
    }

    #[test]
    fn test_inverted_indicator() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let led = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);
        let mut worker = worker(&queue, &clock, Some(led), Some(true));
        assert!(queue.queue_command(1, 1, Button::UP, 1));

        let _ = worker.step();

        let _ = worker.indicator.as_mut().map(|led| led.done());
    }

    #[test]
    fn test_repeats_use_full_sync_word() {
        let queue = RadioQueue::new();
        let clock = SimClock::new();
        let mut worker = worker(&queue, &clock, None, None);
        assert!(queue.queue_command(1, 1, Button::UP, 2));

        let _ = worker.step();

        let events = &worker.radio().events;
        let full_sync = events
            .iter()
            .position(|e| *e == RadioEvent::Sync(SYNC_REPEAT.to_vec()))
            .unwrap();
        let after: Vec<_> = events[full_sync..]
            .iter()
            .filter(|e| matches!(e, RadioEvent::Transmit { .. }))
            .collect();
        assert_eq!(after.len(), 2);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_worker_on_its_own_thread() {
        use crate::timer::StdClock;
        use core::convert::Infallible;
        use embedded_hal_mock::eh1::delay::StdSleep;

        #[derive(Debug, Default)]
        struct CountingRadio {
            packets: usize,
        }

        impl Transceiver for CountingRadio {
            type Error = Infallible;

            fn reset(&mut self) -> Result<(), Infallible> {
                Ok(())
            }
            fn initialize(&mut self) -> Result<(), Infallible> {
                Ok(())
            }
            fn set_frequency(&mut self, _mhz: f64) -> Result<(), Infallible> {
                Ok(())
            }
            fn frequency(&mut self) -> Result<f64, Infallible> {
                Ok(RTS_FREQUENCY_MHZ)
            }
            fn set_symbol_width(&mut self, _us: u16) -> Result<(), Infallible> {
                Ok(())
            }
            fn bit_rate(&mut self) -> Result<u32, Infallible> {
                Ok(1_562)
            }
            fn version(&mut self) -> Result<u8, Infallible> {
                Ok(0x24)
            }
            fn set_sync_bytes(&mut self, _pattern: &[u8]) -> Result<(), Infallible> {
                Ok(())
            }
            fn set_packet_format(&mut self, _manchester: bool, _len: u8) -> Result<(), Infallible> {
                Ok(())
            }
            fn transmit_packet(&mut self, _bytes: &[u8]) -> Result<(), Infallible> {
                self.packets += 1;
                Ok(())
            }
            fn receive_packet(&mut self, buf: &mut [u8]) -> Result<(), Infallible> {
                buf.copy_from_slice(&encode(0x123456, 7, Button::MY));
                Ok(())
            }
            fn enable_receive(&mut self) -> Result<(), Infallible> {
                Ok(())
            }
            fn standby(&mut self) -> Result<(), Infallible> {
                Ok(())
            }
        }

        let queue = RadioQueue::new();
        let clock = StdClock::new();
        let mut worker = RadioWorker::<_, _, _, PinMock>::new(
            &queue,
            CountingRadio::default(),
            clock,
            StdSleep::new(),
            None,
            None,
            RadioConfig::default(),
        );

        let worker = std::thread::scope(|s| {
            let handle = s.spawn(move || {
                worker.run();
                worker
            });

            assert!(queue.queue_command(1, 1, Button::UP, 1));
            queue.receive_ready();
            assert!(queue.queue_command(2, 2, Button::DOWN, 0));
            queue.request_shutdown(&mut StdSleep::new());
            queue.await_drained(&mut StdSleep::new());

            handle.join().unwrap()
        });

        assert_eq!(worker.tx_good, 2);
        assert_eq!(worker.radio().packets, 5);
        assert_eq!(queue.state(), WorkerState::ShuttingDown);
        assert_eq!(queue.received_len(), 1);
    }
}
