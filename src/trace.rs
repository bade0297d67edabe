//! Simulated platform that records a logical pin trace.
//!
//! Every register write advances a virtual clock by the bus write cost and
//! turns into per-pin edges, so tests can measure pulse widths the way a logic
//! analyser would. Spins advance the clock by their cycle count.

extern crate std;

use std::vec::Vec;

use crate::control::ControlBlock;
use crate::hal::{CycleCounter, GpioBanks, Platform};
use crate::mapping::{Bank, Pin, BANK_COUNT};
use crate::timing::BusProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Write {
    pub at_ns: u64,
    pub bank: Bank,
    pub high: bool,
    pub pins: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pulse {
    pub rise_ns: u64,
    pub fall_ns: u64,
}

impl Pulse {
    pub fn width_ns(&self) -> u64 {
        self.fall_ns - self.rise_ns
    }
}

#[derive(Debug)]
pub(crate) struct PinTrace<'a> {
    bus: BusProfile,
    now_ns: u64,
    counter_start_ns: u64,
    writes: Vec<Write>,
    spins: Vec<(u64, u32)>,
    signals: Vec<u64>,
    controller: bool,
    control: Option<&'a ControlBlock>,
    command_at_first_write: Option<u32>,
    response_while_busy: u32,
}

impl<'a> PinTrace<'a> {
    pub fn new(bus: BusProfile) -> Self {
        Self {
            bus,
            now_ns: 0,
            counter_start_ns: 0,
            writes: Vec::new(),
            spins: Vec::new(),
            signals: Vec::new(),
            controller: true,
            control: None,
            command_at_first_write: None,
            response_while_busy: 0,
        }
    }

    /// Snapshot `control` on every pin write and spin.
    pub fn watching(mut self, control: &'a ControlBlock) -> Self {
        self.control = Some(control);
        self
    }

    pub fn follower(mut self) -> Self {
        self.controller = false;
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn spins(&self) -> &[(u64, u32)] {
        &self.spins
    }

    pub fn signals(&self) -> &[u64] {
        &self.signals
    }

    pub fn command_at_first_write(&self) -> Option<u32> {
        self.command_at_first_write
    }

    /// Every response bit seen during a pin write or a spin.
    pub fn response_while_busy(&self) -> u32 {
        self.response_while_busy
    }

    /// Completed high pulses of `pin`, in order.
    pub fn pulses(&self, pin: Pin) -> Vec<Pulse> {
        let mut pulses = Vec::new();
        let mut high = false;
        let mut rise_ns = 0;
        for write in self.writes.iter().filter(|w| w.bank == pin.bank) {
            if write.pins & pin.mask() == 0 {
                continue;
            }
            match (high, write.high) {
                (false, true) => {
                    high = true;
                    rise_ns = write.at_ns;
                }
                (true, false) => {
                    high = false;
                    pulses.push(Pulse {
                        rise_ns,
                        fall_ns: write.at_ns,
                    });
                }
                _ => {}
            }
        }
        pulses
    }

    /// Time of the last falling edge on any pin.
    pub fn last_fall_ns(&self) -> Option<u64> {
        let mut levels = [0u32; BANK_COUNT];
        let mut last = None;
        for write in &self.writes {
            let level = &mut levels[write.bank.index()];
            if write.high {
                *level |= write.pins;
            } else {
                if *level & write.pins != 0 {
                    last = Some(write.at_ns);
                }
                *level &= !write.pins;
            }
        }
        last
    }

    fn sample_response(&mut self) {
        if let Some(control) = self.control {
            self.response_while_busy |= control.response().raw();
        }
    }

    fn record(&mut self, bank: Bank, high: bool, pins: u32) {
        if let Some(control) = self.control {
            if self.command_at_first_write.is_none() {
                self.command_at_first_write = Some(control.command());
            }
        }
        self.sample_response();
        self.writes.push(Write {
            at_ns: self.now_ns,
            bank,
            high,
            pins,
        });
        self.now_ns += u64::from(self.bus.write_ns);
    }
}

impl GpioBanks for PinTrace<'_> {
    fn set(&mut self, bank: Bank, pins: u32) {
        self.record(bank, true, pins);
    }

    fn clear(&mut self, bank: Bank, pins: u32) {
        self.record(bank, false, pins);
    }
}

impl CycleCounter for PinTrace<'_> {
    fn reset(&mut self) {
        self.counter_start_ns = self.now_ns;
    }

    fn cycles(&self) -> u32 {
        let elapsed = self.now_ns - self.counter_start_ns;
        (elapsed * u64::from(self.bus.clock_hz) / 1_000_000_000) as u32
    }
}

impl Platform for PinTrace<'_> {
    fn spin(&mut self, cycles: u32) {
        self.sample_response();
        self.spins.push((self.now_ns, cycles));
        self.now_ns += u64::from(cycles) * 1_000_000_000 / u64::from(self.bus.clock_hz);
    }

    fn signal_host(&mut self) {
        self.signals.push(self.now_ns);
    }

    fn is_controller(&self) -> bool {
        self.controller
    }

    fn halt(&mut self) -> ! {
        panic!("core halted");
    }
}
