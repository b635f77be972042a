//! Test doubles: a simulated clock and a recording transceiver.

use core::cell::Cell;
use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;

use crate::frame::RawFrame;
use crate::queue::RadioQueue;
use crate::timer::{Clock, Instant};
use crate::transceiver::Transceiver;

/// A clock that only moves when something sleeps on it.
///
/// Implements `DelayNs` for `&SimClock`, so the same instance can be handed to code
/// as both its time source and its delay provider.
#[derive(Debug, Default)]
pub(crate) struct SimClock {
    now_us: Cell<u64>,
}

impl SimClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.now_us.get())
    }
}

impl DelayNs for &SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance_us((ns as u64).div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.advance_us(us as u64);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance_us(ms as u64 * 1_000);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RadioEvent {
    Reset,
    Initialize,
    Frequency(f64),
    SymbolWidth(u16),
    Sync(Vec<u8>),
    Format { manchester: bool, len: u8 },
    Transmit { at: Instant, bytes: Vec<u8> },
    Receive,
    EnableReceive,
    Standby,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RadioFault;

/// A transceiver that records every call, stamped with the simulated time.
#[derive(Debug)]
pub(crate) struct RecordingRadio<'a> {
    clock: &'a SimClock,
    pub(crate) events: Vec<RadioEvent>,
    pub(crate) inbox: VecDeque<RawFrame>,
    /// Simulated time each transmitted packet spends on air.
    pub(crate) airtime_us: u64,
    pub(crate) fail_transmit: bool,
    /// Raises the queue's receive-ready flag after every packet, as DIO0 does on PacketSent.
    pub(crate) notify: Option<&'a RadioQueue>,
    frequency_mhz: f64,
    symbol_width_us: u16,
}

impl<'a> RecordingRadio<'a> {
    pub(crate) fn new(clock: &'a SimClock) -> Self {
        Self {
            clock,
            events: Vec::new(),
            inbox: VecDeque::new(),
            airtime_us: 0,
            fail_transmit: false,
            notify: None,
            frequency_mhz: 0.0,
            symbol_width_us: 0,
        }
    }

    /// Start times and payloads of every transmitted packet.
    pub(crate) fn transmissions(&self) -> Vec<(Instant, Vec<u8>)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RadioEvent::Transmit { at, bytes } => Some((*at, bytes.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Transceiver for RecordingRadio<'_> {
    type Error = RadioFault;

    fn reset(&mut self) -> Result<(), RadioFault> {
        self.events.push(RadioEvent::Reset);
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), RadioFault> {
        self.events.push(RadioEvent::Initialize);
        Ok(())
    }

    fn set_frequency(&mut self, mhz: f64) -> Result<(), RadioFault> {
        self.frequency_mhz = mhz;
        self.events.push(RadioEvent::Frequency(mhz));
        Ok(())
    }

    fn frequency(&mut self) -> Result<f64, RadioFault> {
        Ok(self.frequency_mhz)
    }

    fn set_symbol_width(&mut self, us: u16) -> Result<(), RadioFault> {
        self.symbol_width_us = us;
        self.events.push(RadioEvent::SymbolWidth(us));
        Ok(())
    }

    fn bit_rate(&mut self) -> Result<u32, RadioFault> {
        Ok(1_000_000 / self.symbol_width_us.max(1) as u32)
    }

    fn version(&mut self) -> Result<u8, RadioFault> {
        Ok(0x24)
    }

    fn set_sync_bytes(&mut self, pattern: &[u8]) -> Result<(), RadioFault> {
        self.events.push(RadioEvent::Sync(pattern.to_vec()));
        Ok(())
    }

    fn set_packet_format(&mut self, manchester: bool, fixed_len: u8) -> Result<(), RadioFault> {
        self.events.push(RadioEvent::Format {
            manchester,
            len: fixed_len,
        });
        Ok(())
    }

    fn transmit_packet(&mut self, bytes: &[u8]) -> Result<(), RadioFault> {
        if self.fail_transmit {
            return Err(RadioFault);
        }
        self.events.push(RadioEvent::Transmit {
            at: self.clock.now(),
            bytes: bytes.to_vec(),
        });
        self.clock.advance_us(self.airtime_us);
        if let Some(queue) = self.notify {
            queue.receive_ready();
        }
        Ok(())
    }

    fn receive_packet(&mut self, buf: &mut [u8]) -> Result<(), RadioFault> {
        self.events.push(RadioEvent::Receive);
        let frame = self.inbox.pop_front().unwrap_or_default();
        buf.copy_from_slice(&frame[..buf.len()]);
        Ok(())
    }

    fn enable_receive(&mut self) -> Result<(), RadioFault> {
        self.events.push(RadioEvent::EnableReceive);
        Ok(())
    }

    fn standby(&mut self) -> Result<(), RadioFault> {
        self.events.push(RadioEvent::Standby);
        Ok(())
    }
}
