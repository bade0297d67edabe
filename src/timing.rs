//! Bit cell timing and its calibration.
//!
//! ## How WS281x bits look on the wire
//!
//! Every bit cell starts with a rising edge. A `0` bit falls after T0H, a `1`
//! bit after the longer T1H, and the line then stays low until the next cell.
//! Holding the line low for at least TLD latches the shifted data into the
//! LEDs.
//!
//! ```text
//!        |<- T0H ->|
//! 0 bit  ‾‾‾‾‾‾‾‾‾‾|__________________________|
//!        |<---- T1H ---->|
//! 1 bit  ‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾|____________________|
//!        |<------------- period ------------->|
//! ```
//!
//! ## Repeated writes as delays
//!
//! The emitter has no timer to wait on. Each phase of a cell is a number of
//! *rounds*, one round being one register write to every bank. The writes are
//! idempotent, so repeating them is a delay that also keeps the bus busy.
//! [`Timing::calibrate`] turns the protocol numbers into round counts given the
//! cost of one bus write on the target; the counts are not portable between
//! platforms.

use crate::mapping::BANK_COUNT;

/// Protocol timing of one LED variant, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ws281xTiming {
    /// High time of a `0` bit
    pub t0h_ns: u32,
    /// High time of a `1` bit
    pub t1h_ns: u32,
    /// Full bit cell
    pub period_ns: u32,
    /// Allowed deviation of T0H and T1H
    pub tolerance_ns: u32,
    /// Allowed deviation of the period
    pub period_tolerance_ns: u32,
    /// Minimum low time that latches a frame, in microseconds
    pub latch_us: u32,
}

impl Ws281xTiming {
    /// WS2811 in 800 kHz mode.
    pub const WS2811_800KHZ: Self = Self {
        t0h_ns: 250,
        t1h_ns: 600,
        period_ns: 1250,
        tolerance_ns: 150,
        period_tolerance_ns: 600,
        latch_us: 300,
    };

    /// Whether `widths` fall inside this variant's tolerance windows.
    #[must_use]
    pub const fn accepts(&self, widths: &PulseWidths) -> bool {
        within(widths.t0h_ns, self.t0h_ns, self.tolerance_ns)
            && within(widths.t1h_ns, self.t1h_ns, self.tolerance_ns)
            && within(widths.period_ns, self.period_ns, self.period_tolerance_ns)
            && widths.latch_ns >= self.latch_us as u64 * 1_000
    }
}

const fn within(value: u32, nominal: u32, tolerance: u32) -> bool {
    value + tolerance >= nominal && value <= nominal + tolerance
}

/// Cost of the operations the emitter is built from, on one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusProfile {
    /// Time one set/clear register write occupies the core, in nanoseconds
    pub write_ns: u32,
    /// Core clock, used to size the latch spin
    pub clock_hz: u32,
}

impl BusProfile {
    /// 200 MHz real-time core posting writes to L4 GPIO in about 30 ns.
    pub const PRU_200MHZ: Self = Self {
        write_ns: 30,
        clock_hz: 200_000_000,
    };
}

/// Pulse widths a [`Timing`] produces on a given bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseWidths {
    /// High time of a `0` bit
    pub t0h_ns: u32,
    /// High time of a `1` bit
    pub t1h_ns: u32,
    /// Full bit cell
    pub period_ns: u32,
    /// Latch spin
    pub latch_ns: u64,
}

/// Round counts for each phase of a bit cell plus the latch spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    rise_rounds: u16,
    hold_rounds: u16,
    tail_rounds: u16,
    latch_cycles: u32,
}

impl Timing {
    /// WS2811 at 800 kHz on [`BusProfile::PRU_200MHZ`].
    pub const DEFAULT: Self =
        Self::calibrate(&Ws281xTiming::WS2811_800KHZ, BusProfile::PRU_200MHZ);

    /// Create from explicit counts. Each phase gets at least one round.
    #[must_use]
    pub const fn new(
        rise_rounds: u16,
        hold_rounds: u16,
        tail_rounds: u16,
        latch_cycles: u32,
    ) -> Self {
        Self {
            rise_rounds: at_least_one(rise_rounds),
            hold_rounds: at_least_one(hold_rounds),
            tail_rounds: at_least_one(tail_rounds),
            latch_cycles,
        }
    }

    /// Derive round counts for `target` on `bus`.
    ///
    /// T0H and T1H round to the nearest round, the period rounds up so the
    /// low time is never short, and the latch spin rounds up to whole cycles.
    #[must_use]
    pub const fn calibrate(target: &Ws281xTiming, bus: BusProfile) -> Self {
        let round_ns = round_ns(bus.write_ns);
        let rise = div_nearest(target.t0h_ns, round_ns);
        let high = div_nearest(target.t1h_ns, round_ns);
        let cell = target.period_ns.div_ceil(round_ns);

        let rise = at_least_one_u32(rise);
        let high = max_u32(high, rise + 1);
        let cell = max_u32(cell, high + 1);

        let latch_cycles =
            (target.latch_us as u64 * bus.clock_hz as u64).div_ceil(1_000_000) as u32;

        Self::new(
            rise as u16,
            (high - rise) as u16,
            (cell - high) as u16,
            latch_cycles,
        )
    }

    /// Rounds of "set all" that make up T0H.
    #[must_use]
    pub const fn rise_rounds(&self) -> u16 {
        self.rise_rounds
    }

    /// Rounds of "clear zeros" between T0H and T1H.
    #[must_use]
    pub const fn hold_rounds(&self) -> u16 {
        self.hold_rounds
    }

    /// Rounds of "clear all" that finish the cell.
    #[must_use]
    pub const fn tail_rounds(&self) -> u16 {
        self.tail_rounds
    }

    /// Core cycles spun after the last row.
    #[must_use]
    pub const fn latch_cycles(&self) -> u32 {
        self.latch_cycles
    }

    /// Register writes in one bit cell.
    #[must_use]
    pub const fn writes_per_cell(&self) -> u32 {
        (self.rise_rounds as u32 + self.hold_rounds as u32 + self.tail_rounds as u32)
            * BANK_COUNT as u32
    }

    /// Predicted pulse widths on `bus`, ignoring the time spent encoding.
    #[must_use]
    pub const fn pulse_widths(&self, bus: BusProfile) -> PulseWidths {
        let round_ns = round_ns(bus.write_ns);
        let t0h_ns = self.rise_rounds as u32 * round_ns;
        PulseWidths {
            t0h_ns,
            t1h_ns: t0h_ns + self.hold_rounds as u32 * round_ns,
            period_ns: self.writes_per_cell() * bus.write_ns,
            latch_ns: if bus.clock_hz == 0 {
                0
            } else {
                self.latch_cycles as u64 * 1_000_000_000 / bus.clock_hz as u64
            },
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const _: () = assert!(Ws281xTiming::WS2811_800KHZ
    .accepts(&Timing::DEFAULT.pulse_widths(BusProfile::PRU_200MHZ)));

const fn round_ns(write_ns: u32) -> u32 {
    at_least_one_u32(write_ns * BANK_COUNT as u32)
}

const fn div_nearest(value: u32, divisor: u32) -> u32 {
    (value + divisor / 2) / divisor
}

const fn at_least_one(value: u16) -> u16 {
    if value == 0 {
        1
    } else {
        value
    }
}

const fn at_least_one_u32(value: u32) -> u32 {
    if value == 0 {
        1
    } else {
        value
    }
}

const fn max_u32(a: u32, b: u32) -> u32 {
    if a > b {
        a
    } else {
        b
    }
}
