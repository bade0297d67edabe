//! Hardware seam of the waveform core.
//!
//! The core needs very little from the chip it runs on: a set/clear register
//! pair per GPIO bank, a free-running cycle counter, a calibrated spin, and a
//! line to raise towards the frame producer. These traits name exactly that,
//! so the same state machine runs against memory-mapped registers on the
//! target and against a simulated pin trace on a host.
//!
//! [`MmioGpio`] and [`MmioCycleCounter`] cover the register side for chips
//! with TI-style GPIO modules and a PRU-style control block. The spin and the
//! host signal are instruction-level details left to the board's
//! [`Platform`] implementation.

use crate::mapping::{Bank, BANK_COUNT};

/// Write access to the GPIO banks.
///
/// Both operations are single register writes on real hardware: bits set in
/// `pins` change, every other pin of the bank keeps its level.
pub trait GpioBanks {
    /// Drive the pins in `pins` high.
    fn set(&mut self, bank: Bank, pins: u32);

    /// Drive the pins in `pins` low.
    fn clear(&mut self, bank: Bank, pins: u32);
}

impl<G: GpioBanks + ?Sized> GpioBanks for &mut G {
    #[inline(always)]
    fn set(&mut self, bank: Bank, pins: u32) {
        (**self).set(bank, pins);
    }

    #[inline(always)]
    fn clear(&mut self, bank: Bank, pins: u32) {
        (**self).clear(bank, pins);
    }
}

/// Free-running cycle counter used for the per-frame diagnostic.
pub trait CycleCounter {
    /// Restart counting from zero.
    fn reset(&mut self);

    /// Cycles since the last reset.
    fn cycles(&self) -> u32;
}

/// Everything the handshake needs from the core it runs on.
pub trait Platform: GpioBanks + CycleCounter {
    /// Busy-wait for at least `cycles` core cycles.
    fn spin(&mut self, cycles: u32);

    /// Raise the out-of-band signal towards the frame producer.
    fn signal_host(&mut self);

    /// Whether this core owns the pins.
    ///
    /// With several real-time cores sharing the bus only one may transmit;
    /// the others must stay off the bus entirely.
    fn is_controller(&self) -> bool {
        true
    }

    /// Stop this core for good.
    fn halt(&mut self) -> !;
}

/// Offset of the write-one-to-clear data register in a GPIO module.
pub const GPIO_CLEARDATAOUT: usize = 0x190;
/// Offset of the write-one-to-set data register in a GPIO module.
pub const GPIO_SETDATAOUT: usize = 0x194;

/// GPIO module base addresses on the AM335x, in [`Bank`] order.
pub const AM335X_GPIO_BASES: [usize; BANK_COUNT] =
    [0x44E0_7000, 0x4804_C000, 0x481A_C000, 0x481A_E000];

/// Memory-mapped set/clear registers, one module per bank.
#[derive(Debug)]
pub struct MmioGpio {
    set: [*mut u32; BANK_COUNT],
    clear: [*mut u32; BANK_COUNT],
}

impl MmioGpio {
    /// Use the GPIO modules at `bases`.
    ///
    /// # Safety
    /// Each base must be a mapped GPIO module with set/clear data registers at
    /// [`GPIO_SETDATAOUT`] and [`GPIO_CLEARDATAOUT`], and nothing else may
    /// drive the pins this core is given through the channel map.
    #[must_use]
    pub const unsafe fn new(bases: [usize; BANK_COUNT]) -> Self {
        let mut set = [core::ptr::null_mut(); BANK_COUNT];
        let mut clear = [core::ptr::null_mut(); BANK_COUNT];
        let mut i = 0;
        while i < BANK_COUNT {
            set[i] = (bases[i] + GPIO_SETDATAOUT) as *mut u32;
            clear[i] = (bases[i] + GPIO_CLEARDATAOUT) as *mut u32;
            i += 1;
        }
        Self { set, clear }
    }

    /// The AM335x modules.
    ///
    /// # Safety
    /// As [`MmioGpio::new`].
    #[must_use]
    pub const unsafe fn am335x() -> Self {
        Self::new(AM335X_GPIO_BASES)
    }
}

impl GpioBanks for MmioGpio {
    #[inline(always)]
    fn set(&mut self, bank: Bank, pins: u32) {
        // SAFETY: register addresses were vouched for in `new`.
        unsafe { self.set[bank.index()].write_volatile(pins) }
    }

    #[inline(always)]
    fn clear(&mut self, bank: Bank, pins: u32) {
        // SAFETY: register addresses were vouched for in `new`.
        unsafe { self.clear[bank.index()].write_volatile(pins) }
    }
}

/// Offset of the control register in a PRU control block.
pub const PRU_CTRL_CONTROL: usize = 0x00;
/// Offset of the cycle count register in a PRU control block.
pub const PRU_CTRL_CYCLE: usize = 0x0C;
/// Counter enable bit of the control register.
pub const PRU_CTRL_COUNTER_ENABLE: u32 = 1 << 3;

/// Cycle counter of a PRU-style control block.
///
/// The count register only accepts writes while counting is disabled, so a
/// reset briefly stops the counter.
#[derive(Debug)]
pub struct MmioCycleCounter {
    control: *mut u32,
    cycle: *mut u32,
}

impl MmioCycleCounter {
    /// Use the control block at `base`.
    ///
    /// # Safety
    /// `base` must be this core's mapped control block.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self {
            control: (base + PRU_CTRL_CONTROL) as *mut u32,
            cycle: (base + PRU_CTRL_CYCLE) as *mut u32,
        }
    }
}

impl CycleCounter for MmioCycleCounter {
    fn reset(&mut self) {
        // SAFETY: register addresses were vouched for in `new`.
        unsafe {
            let control = self.control.read_volatile();
            self.control
                .write_volatile(control & !PRU_CTRL_COUNTER_ENABLE);
            self.cycle.write_volatile(0);
            self.control
                .write_volatile(control | PRU_CTRL_COUNTER_ENABLE);
        }
    }

    #[inline(always)]
    fn cycles(&self) -> u32 {
        // SAFETY: register addresses were vouched for in `new`.
        unsafe { self.cycle.read_volatile() }
    }
}
