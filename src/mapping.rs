//! Static channel to GPIO bank mapping.
//!
//! Each logical channel drives one pin, identified by its [`Bank`] and the bit
//! of that bank's data register. The mapping is fixed when the firmware is
//! built: [`ChannelMap::new`] is a `const fn` and rejects an invalid table at
//! compile time.
//!
//! From the table the map derives one pin mask per bank. Every waveform write
//! is masked against it, so pins that share a bank with the strips but belong
//! to something else are never touched. Channels with no pin assigned drop out
//! of every mask and stay inert.
//!
//! # Example
//! ```rust
//! use ws281x_parallel::mapping::{Bank, ChannelMap, Pin};
//! use ws281x_parallel::CHANNELS;
//!
//! // two strips on bank 1, everything else unwired
//! const MAP: ChannelMap = {
//!     let mut pins = [None; CHANNELS];
//!     pins[0] = Some(Pin::new(Bank::Gpio1, 16));
//!     pins[1] = Some(Pin::new(Bank::Gpio1, 17));
//!     ChannelMap::new(pins)
//! };
//!
//! assert_eq!(MAP.bank_mask(Bank::Gpio1), 0b11 << 16);
//! assert_eq!(MAP.bank_mask(Bank::Gpio0), 0);
//! ```

use crate::CHANNELS;

/// Number of GPIO banks the core can write.
pub const BANK_COUNT: usize = 4;

/// A group of output pins driven through one set/clear register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Bank {
    /// First bank
    Gpio0 = 0,
    /// Second bank
    Gpio1 = 1,
    /// Third bank
    Gpio2 = 2,
    /// Fourth bank
    Gpio3 = 3,
}

impl Bank {
    /// All banks in the order they are written within a bit cell.
    pub const ALL: [Bank; BANK_COUNT] = [Bank::Gpio0, Bank::Gpio1, Bank::Gpio2, Bank::Gpio3];

    /// Index of this bank, `0..BANK_COUNT`.
    #[inline(always)]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pin {
    /// Bank the pin belongs to
    pub bank: Bank,
    /// Bit of the bank's data register, `0..32`
    pub bit: u8,
}

impl Pin {
    /// Create a pin.
    #[must_use]
    pub const fn new(bank: Bank, bit: u8) -> Self {
        Self { bank, bit }
    }

    /// The pin's bit in its bank register, or 0 if `bit` is out of range.
    #[inline(always)]
    #[must_use]
    pub const fn mask(self) -> u32 {
        if self.bit < 32 {
            1 << self.bit
        } else {
            0
        }
    }
}

/// Reasons a channel table is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MapError {
    /// A pin bit is not below 32
    BitOutOfRange {
        /// Offending channel
        channel: usize,
    },
    /// Two channels drive the same pin
    DuplicatePin {
        /// Channel that claimed the pin first
        first: usize,
        /// Channel that claimed it again
        second: usize,
    },
}

impl core::fmt::Display for MapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MapError::BitOutOfRange { channel } => {
                write!(f, "channel {channel} uses a pin bit outside 0..32")
            }
            MapError::DuplicatePin { first, second } => {
                write!(f, "channels {first} and {second} drive the same pin")
            }
        }
    }
}

impl core::error::Error for MapError {}

/// Channel to pin table with the derived per-bank pin masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap {
    pins: [Option<Pin>; CHANNELS],
    bank_masks: [u32; BANK_COUNT],
}

impl ChannelMap {
    /// Reference layout: channels 0-7 on bank 0, 8-15 on bank 1, 16-19 on
    /// bank 2 and 20-23 on bank 3.
    ///
    /// The bits follow a BeagleBone-style cape; boards wired differently build
    /// their own table.
    pub const REFERENCE: Self = Self::new([
        Some(Pin::new(Bank::Gpio0, 2)),
        Some(Pin::new(Bank::Gpio0, 3)),
        Some(Pin::new(Bank::Gpio0, 4)),
        Some(Pin::new(Bank::Gpio0, 5)),
        Some(Pin::new(Bank::Gpio0, 7)),
        Some(Pin::new(Bank::Gpio0, 14)),
        Some(Pin::new(Bank::Gpio0, 15)),
        Some(Pin::new(Bank::Gpio0, 20)),
        Some(Pin::new(Bank::Gpio1, 12)),
        Some(Pin::new(Bank::Gpio1, 13)),
        Some(Pin::new(Bank::Gpio1, 14)),
        Some(Pin::new(Bank::Gpio1, 15)),
        Some(Pin::new(Bank::Gpio1, 16)),
        Some(Pin::new(Bank::Gpio1, 17)),
        Some(Pin::new(Bank::Gpio1, 18)),
        Some(Pin::new(Bank::Gpio1, 19)),
        Some(Pin::new(Bank::Gpio2, 2)),
        Some(Pin::new(Bank::Gpio2, 3)),
        Some(Pin::new(Bank::Gpio2, 4)),
        Some(Pin::new(Bank::Gpio2, 5)),
        Some(Pin::new(Bank::Gpio3, 14)),
        Some(Pin::new(Bank::Gpio3, 15)),
        Some(Pin::new(Bank::Gpio3, 16)),
        Some(Pin::new(Bank::Gpio3, 17)),
    ]);

    /// Build a map, panicking on an invalid table.
    ///
    /// Meant for `const` items, where the panic becomes a build error.
    ///
    /// # Panics
    /// If a pin bit is out of range or two channels share a pin.
    #[must_use]
    pub const fn new(pins: [Option<Pin>; CHANNELS]) -> Self {
        match Self::try_new(pins) {
            Ok(map) => map,
            Err(MapError::BitOutOfRange { .. }) => panic!("channel map: pin bit outside 0..32"),
            Err(MapError::DuplicatePin { .. }) => panic!("channel map: two channels share a pin"),
        }
    }

    /// Build a map, reporting an invalid table.
    ///
    /// # Errors
    /// [`MapError::BitOutOfRange`] if a bit is not below 32,
    /// [`MapError::DuplicatePin`] if two channels drive the same pin.
    pub const fn try_new(pins: [Option<Pin>; CHANNELS]) -> Result<Self, MapError> {
        let mut bank_masks = [0u32; BANK_COUNT];
        let mut owners = [[usize::MAX; 32]; BANK_COUNT];
        let mut channel = 0;
        while channel < CHANNELS {
            if let Some(pin) = pins[channel] {
                if pin.bit >= 32 {
                    return Err(MapError::BitOutOfRange { channel });
                }
                let bank = pin.bank.index();
                let bit = pin.bit as usize;
                if owners[bank][bit] != usize::MAX {
                    return Err(MapError::DuplicatePin {
                        first: owners[bank][bit],
                        second: channel,
                    });
                }
                owners[bank][bit] = channel;
                bank_masks[bank] |= pin.mask();
            }
            channel += 1;
        }
        Ok(Self { pins, bank_masks })
    }

    /// Pin driven by `channel`, if any.
    #[inline(always)]
    #[must_use]
    pub const fn pin(&self, channel: usize) -> Option<Pin> {
        if channel < CHANNELS {
            self.pins[channel]
        } else {
            None
        }
    }

    /// Every pin of `bank` that belongs to a channel.
    #[inline(always)]
    #[must_use]
    pub const fn bank_mask(&self, bank: Bank) -> u32 {
        self.bank_masks[bank.index()]
    }

    /// Pin masks for all banks, indexed by [`Bank::index`].
    #[must_use]
    pub const fn bank_masks(&self) -> &[u32; BANK_COUNT] {
        &self.bank_masks
    }

    /// Number of channels with a pin assigned.
    #[must_use]
    pub fn wired_channels(&self) -> usize {
        self.pins.iter().filter(|pin| pin.is_some()).count()
    }

    /// Iterate `(channel, pin)` for wired channels.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Pin)> + '_ {
        self.pins
            .iter()
            .enumerate()
            .filter_map(|(channel, pin)| pin.map(|pin| (channel, pin)))
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::REFERENCE
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelMap {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "ChannelMap(wired: {}, masks: [{=u32:#x}, {=u32:#x}, {=u32:#x}, {=u32:#x}])",
            self.wired_channels(),
            self.bank_masks[0],
            self.bank_masks[1],
            self.bank_masks[2],
            self.bank_masks[3]
        );
    }
}
