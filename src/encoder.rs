//! Bit encoder: one bit position of a row turned into per-bank zero masks.
//!
//! For every bit of a cell all wired pins rise together; the only thing that
//! differs between channels is whether they fall early. The encoder answers
//! that for one bit position: the zero mask of a bank has a 1 for every pin
//! whose channel sends a `0` at that position.
//!
//! The result is always a subset of the bank's pin mask, so an unwired channel
//! or a foreign pin can never end up in a write.

use crate::mapping::{Bank, ChannelMap, BANK_COUNT};
use crate::pixel::ChannelWord;
use crate::CHANNELS;

/// Pins that fall early, one mask per bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZeroMasks([u32; BANK_COUNT]);

impl ZeroMasks {
    /// No pin falls early: every wired channel sends a `1`.
    pub const NONE: Self = Self([0; BANK_COUNT]);

    /// Zero mask of `bank`.
    #[inline(always)]
    #[must_use]
    pub const fn bank(&self, bank: Bank) -> u32 {
        self.0[bank.index()]
    }

    /// All masks, indexed by [`Bank::index`].
    #[must_use]
    pub const fn as_array(&self) -> &[u32; BANK_COUNT] {
        &self.0
    }
}

/// Zero masks for data bit `bit` (23 first, 0 last) of `words`.
#[inline(always)]
#[must_use]
pub fn encode_bit(words: &[ChannelWord; CHANNELS], bit: u8, map: &ChannelMap) -> ZeroMasks {
    let mut zeros = [0u32; BANK_COUNT];
    for (channel, word) in words.iter().enumerate() {
        if word.data_bit(bit) {
            continue;
        }
        if let Some(pin) = map.pin(channel) {
            zeros[pin.bank.index()] |= pin.mask();
        }
    }
    for (zero, mask) in zeros.iter_mut().zip(map.bank_masks()) {
        *zero &= mask;
    }
    ZeroMasks(zeros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Pin;

    fn words_with(channel: usize, raw: u32) -> [ChannelWord; CHANNELS] {
        let mut words = [ChannelWord::OFF; CHANNELS];
        words[channel] = ChannelWord::from_raw(raw);
        words
    }

    #[test]
    fn test_all_zero_row_is_full_mask() {
        let map = ChannelMap::REFERENCE;
        let words = [ChannelWord::OFF; CHANNELS];
        for bit in 0..24 {
            assert_eq!(encode_bit(&words, bit, &map).as_array(), map.bank_masks());
        }
    }

    #[test]
    fn test_all_one_row_is_empty() {
        let map = ChannelMap::REFERENCE;
        let words = [ChannelWord::from_raw(0xFFFF_FF00); CHANNELS];
        for bit in 0..24 {
            assert_eq!(encode_bit(&words, bit, &map), ZeroMasks::NONE);
        }
    }

    #[test]
    fn test_top_bit_of_channel_zero() {
        let map = ChannelMap::REFERENCE;
        let words = words_with(0, 0x8000_0000);
        let pin = map.pin(0).unwrap();

        let masks = encode_bit(&words, 23, &map);
        assert_eq!(masks.bank(Bank::Gpio0), map.bank_mask(Bank::Gpio0) & !pin.mask());
        assert_eq!(masks.bank(Bank::Gpio1), map.bank_mask(Bank::Gpio1));

        // only bit 23 is set
        let masks = encode_bit(&words, 22, &map);
        assert_eq!(masks.as_array(), map.bank_masks());
    }

    #[test]
    fn test_each_bit_position() {
        let map = ChannelMap::REFERENCE;
        let channel = 12;
        let pin = map.pin(channel).unwrap();
        for bit in 0..24u8 {
            let words = words_with(channel, 1 << (bit + 8));
            for probe in 0..24u8 {
                let masks = encode_bit(&words, probe, &map);
                let falls_early = masks.bank(pin.bank) & pin.mask() != 0;
                assert_eq!(falls_early, probe != bit, "bit {bit} probe {probe}");
            }
        }
    }

    #[test]
    fn test_unused_byte_never_encoded() {
        let map = ChannelMap::REFERENCE;
        let words = [ChannelWord::from_raw(0x0000_00FF); CHANNELS];
        for bit in 0..24 {
            assert_eq!(encode_bit(&words, bit, &map).as_array(), map.bank_masks());
        }
    }

    #[test]
    fn test_unwired_channels_are_inert() {
        let mut pins = [None; CHANNELS];
        pins[4] = Some(Pin::new(Bank::Gpio3, 30));
        let map = ChannelMap::new(pins);
        let words = [ChannelWord::OFF; CHANNELS];

        let masks = encode_bit(&words, 0, &map);
        assert_eq!(masks.as_array(), &[0, 0, 0, 1 << 30]);
    }

    #[test]
    fn test_masks_stay_within_bank_masks() {
        let map = ChannelMap::REFERENCE;
        let mut words = [ChannelWord::OFF; CHANNELS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = ChannelWord::from_raw((i as u32).wrapping_mul(0x9E37_79B9));
        }
        for bit in 0..24 {
            let masks = encode_bit(&words, bit, &map);
            for bank in Bank::ALL {
                assert_eq!(masks.bank(bank) & !map.bank_mask(bank), 0);
            }
        }
    }
}
