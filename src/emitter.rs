//! Bank waveform emitter: one bit cell on every bank.
//!
//! A cell is three phases, each a number of rounds over all banks in
//! [`Bank::ALL`] order:
//!
//! 1. **Rise** – set every wired pin. Repeating the write is the T0H hold.
//! 2. **Selective fall** – clear the zero-mask pins. `0` bits end here, `1`
//!    bits stay high; repeating the write is the T1H − T0H hold.
//! 3. **Full fall** – clear every wired pin, ending the `1` bits. Repeating
//!    the write is the low tail of the cell.
//!
//! Phase 3 starts only after phase 2 has reached every bank, and each phase
//! visits the banks in the same order. Bank *n*'s edges are therefore all
//! shifted by the same *n* writes and its pulse widths equal bank 0's.

use crate::encoder::ZeroMasks;
use crate::hal::GpioBanks;
use crate::mapping::{Bank, ChannelMap};
use crate::timing::Timing;

/// Emit one bit cell.
#[inline(always)]
pub fn emit_bit<G: GpioBanks + ?Sized>(
    gpio: &mut G,
    map: &ChannelMap,
    timing: &Timing,
    zeros: &ZeroMasks,
) {
    for _ in 0..timing.rise_rounds() {
        for bank in Bank::ALL {
            gpio.set(bank, map.bank_mask(bank));
        }
    }
    for _ in 0..timing.hold_rounds() {
        for bank in Bank::ALL {
            gpio.clear(bank, zeros.bank(bank));
        }
    }
    for _ in 0..timing.tail_rounds() {
        for bank in Bank::ALL {
            gpio.clear(bank, map.bank_mask(bank));
        }
    }
}
