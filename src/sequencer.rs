//! Frame sequencer: every bit of every row, encoded and emitted.
//!
//! Rows are read one at a time from the published address, stepping by
//! [`ROW_BYTES`]. Within a row the 24 data bits go out most significant first,
//! all channels in parallel. The row count is taken as given; a count larger
//! than the buffer is the producer's mistake and simply sends whatever the
//! memory holds.

use crate::encoder::encode_bit;
use crate::emitter::emit_bit;
use crate::hal::GpioBanks;
use crate::pixel::{PixelMemory, ROW_BYTES};
use crate::{Config, BITS_PER_CHANNEL};

/// What one transmission put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameStats {
    /// Rows sent
    pub rows: u32,
    /// Bit cells emitted, `rows * 24` wrapped to 32 bits
    pub bit_cells: u32,
}

impl FrameStats {
    /// Count one fully sent row. Both counters wrap.
    pub fn add_row(&mut self) {
        self.rows = self.rows.wrapping_add(1);
        self.bit_cells = self.bit_cells.wrapping_add(u32::from(BITS_PER_CHANNEL));
    }
}

/// Send `rows` rows starting at bus address `address`.
pub fn transmit_frame<G, M>(
    gpio: &mut G,
    memory: &M,
    config: &Config,
    address: u32,
    rows: u32,
) -> FrameStats
where
    G: GpioBanks + ?Sized,
    M: PixelMemory + ?Sized,
{
    let mut stats = FrameStats::default();
    let mut address = address;
    let mut remaining = rows;
    while remaining > 0 {
        let words = memory.load_row(address).words();
        for bit in (0..BITS_PER_CHANNEL).rev() {
            let zeros = encode_bit(&words, bit, &config.map);
            emit_bit(gpio, &config.map, &config.timing, &zeros);
        }
        stats.add_row();
        address = address.wrapping_add(ROW_BYTES as u32);
        remaining -= 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::mapping::{Bank, ChannelMap, Pin};
    use crate::pixel::{ChannelWord, PixelBuffer};
    use crate::timing::{BusProfile, Timing};
    use crate::trace::PinTrace;
    use crate::{Color, CHANNELS};
    use embedded_graphics::prelude::{Point, RgbColor};

    const BASE: u32 = 0x8000_0000;

    fn run<const ROWS: usize>(
        buffer: &PixelBuffer<ROWS>,
        rows: u32,
    ) -> (PinTrace<'static>, FrameStats) {
        let mut trace = PinTrace::new(BusProfile::PRU_200MHZ);
        let stats = transmit_frame(
            &mut trace,
            &buffer.mapped_at(BASE),
            &Config::DEFAULT,
            BASE,
            rows,
        );
        (trace, stats)
    }

    /// Decode the bits `pin` received, one per pulse.
    fn received_bits(trace: &PinTrace<'_>, pin: Pin) -> Vec<bool> {
        let widths = Timing::DEFAULT.pulse_widths(BusProfile::PRU_200MHZ);
        trace
            .pulses(pin)
            .iter()
            .map(|p| p.width_ns() == u64::from(widths.t1h_ns))
            .collect()
    }

    #[test]
    fn test_bit_cell_count() {
        let buffer = PixelBuffer::<5>::new();
        let (trace, stats) = run(&buffer, 5);
        assert_eq!(stats, FrameStats { rows: 5, bit_cells: 120 });
        assert_eq!(
            trace.writes().len() as u32,
            120 * Timing::DEFAULT.writes_per_cell()
        );
        for (_, pin) in ChannelMap::REFERENCE.iter() {
            assert_eq!(trace.pulses(pin).len(), 120);
        }
    }

    #[test]
    fn test_stats_wrap_instead_of_overflowing() {
        let mut stats = FrameStats {
            rows: u32::MAX,
            bit_cells: u32::MAX - 10,
        };
        stats.add_row();
        assert_eq!(stats, FrameStats { rows: 0, bit_cells: 13 });
    }

    #[test]
    fn test_zero_rows_emits_nothing() {
        let buffer = PixelBuffer::<2>::new();
        let (trace, stats) = run(&buffer, 0);
        assert_eq!(stats, FrameStats::default());
        assert!(trace.writes().is_empty());
    }

    #[test]
    fn test_bits_arrive_green_red_blue_msb_first() {
        let mut buffer = PixelBuffer::<2>::new();
        buffer.set_pixel(Point::new(9, 0), Color::new(0x0F, 0xA0, 0x01));
        buffer.set_pixel(Point::new(9, 1), Color::new(0x80, 0x00, 0xFF));
        let (trace, _) = run(&buffer, 2);

        let bits = received_bits(&trace, ChannelMap::REFERENCE.pin(9).unwrap());
        let mut expected = Vec::new();
        for byte in [0xA0u8, 0x0F, 0x01, 0x00, 0x80, 0xFF] {
            for bit in (0..8).rev() {
                expected.push((byte >> bit) & 1 == 1);
            }
        }
        assert_eq!(bits, expected);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut buffer = PixelBuffer::<1>::new();
        for channel in 0..CHANNELS {
            let raw = (channel as u32 + 1).wrapping_mul(0x0101_0100);
            buffer.row_mut(0).set_word(channel, ChannelWord::from_raw(raw));
        }
        let (trace, _) = run(&buffer, 1);

        for (channel, pin) in ChannelMap::REFERENCE.iter() {
            let word = buffer.row(0).word(channel);
            let expected: Vec<bool> = (0..24u8).rev().map(|bit| word.data_bit(bit)).collect();
            assert_eq!(received_bits(&trace, pin), expected, "channel {channel}");
        }
    }

    #[test]
    fn test_rows_advance_by_stride() {
        let mut buffer = PixelBuffer::<3>::new();
        buffer.set_pixel(Point::new(0, 2), Color::new(0, 0xFF, 0));
        let (trace, _) = run(&buffer, 3);

        let bits = received_bits(&trace, ChannelMap::REFERENCE.pin(0).unwrap());
        assert_eq!(bits.len(), 72);
        assert!(bits[..48].iter().all(|b| !b));
        assert!(bits[48..56].iter().all(|b| *b));
        assert!(bits[56..].iter().all(|b| !b));
    }

    #[test]
    fn test_overlong_row_count_sends_black() {
        let mut buffer = PixelBuffer::<1>::new();
        buffer.set_pixel(Point::new(0, 0), Color::WHITE);
        let (trace, stats) = run(&buffer, 2);

        assert_eq!(stats.rows, 2);
        let bits = received_bits(&trace, ChannelMap::REFERENCE.pin(0).unwrap());
        assert!(bits[..24].iter().all(|b| *b));
        assert!(bits[24..].iter().all(|b| !b));
    }

    #[test]
    fn test_never_touches_foreign_pins() {
        let mut pins = [None; CHANNELS];
        pins[0] = Some(Pin::new(Bank::Gpio1, 3));
        pins[23] = Some(Pin::new(Bank::Gpio1, 28));
        let config = Config {
            map: ChannelMap::new(pins),
            timing: Timing::DEFAULT,
        };

        let mut buffer = PixelBuffer::<4>::new();
        for row in 0..4 {
            for channel in 0..CHANNELS {
                let raw = ((row * CHANNELS + channel) as u32).wrapping_mul(0x2545_F491);
                buffer.row_mut(row).set_word(channel, ChannelWord::from_raw(raw));
            }
        }

        let mut trace = PinTrace::new(BusProfile::PRU_200MHZ);
        transmit_frame(&mut trace, &buffer.mapped_at(BASE), &config, BASE, 4);
        for write in trace.writes() {
            assert_eq!(write.pins & !config.map.bank_mask(write.bank), 0);
        }
    }
}
