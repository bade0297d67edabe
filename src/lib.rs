//! Waveform core for driving up to 24 parallel WS281x LED strips from GPIO
//! banks.
//!
//! ## How WS281x LED strips work
//!
//! WS281x pixels (WS2811, WS2812, WS2812B and friends) sit on a single data
//! line, daisy-chained. There is no clock: the bit value is encoded in the
//! width of a high pulse.
//!
//! ### Signal encoding
//! - Every bit cell begins with a rising edge.
//! - A `0` bit falls after **T0H** (≈250 ns), a `1` bit after **T1H** (≈600
//!   ns); the cell lasts about 1.25 µs at 800 kHz.
//! - Each pixel takes the first 24 bits it sees (green, red, blue, most
//!   significant bit first) and forwards everything after that down the chain.
//! - Holding the line low for the latch time (**TLD**, here ≥ 300 µs) makes
//!   every pixel show its new colour and readies the chain for the next frame.
//!
//! ### Implications for drivers
//! - Timing windows are around ±150 ns, so the edges must be placed by
//!   counting instructions, with no interrupts and no scheduler in between.
//! - Nothing comes back from the strip. A glitch is only visible as a wrong
//!   colour.
//!
//! ## Driving many strips at once
//!
//! All strips are sent in lock-step: for each bit position every wired pin
//! rises at once, the pins sending a `0` fall at T0H and the rest at T1H. Pins
//! are grouped in GPIO *banks* that are written through set/clear registers,
//! so one register write moves every pin of a bank.
//!
//! The crate is built from small pieces, leaf first:
//!
//! 1. [`control`] – the 16-byte handshake block shared with the frame
//!    producer.
//! 2. [`pixel`] – the 96-byte row layout and the producer-side
//!    [`pixel::PixelBuffer`].
//! 3. [`mapping`] – the compile-time channel to pin table and bank pin masks.
//! 4. [`encoder`] – one bit position of a row into per-bank zero masks.
//! 5. [`emitter`] – one bit cell on every bank.
//! 6. [`sequencer`] – every bit of every row of a frame.
//! 7. [`driver`] – the command/response state machine around all of it.
//!
//! [`timing`] calibrates the emitter for a bus and [`hal`] is the seam to the
//! hardware.
//!
//! ## Example
//! ```rust,no_run
//! use ws281x_parallel::control::ControlBlock;
//! use ws281x_parallel::driver::Driver;
//! use ws281x_parallel::hal::{CycleCounter, GpioBanks, MmioCycleCounter, MmioGpio, Platform};
//! use ws281x_parallel::mapping::Bank;
//! use ws281x_parallel::pixel::PhysicalMemory;
//! use ws281x_parallel::Config;
//!
//! struct Board {
//!     gpio: MmioGpio,
//!     counter: MmioCycleCounter,
//! }
//!
//! impl GpioBanks for Board {
//!     fn set(&mut self, bank: Bank, pins: u32) {
//!         self.gpio.set(bank, pins);
//!     }
//!     fn clear(&mut self, bank: Bank, pins: u32) {
//!         self.gpio.clear(bank, pins);
//!     }
//! }
//!
//! impl CycleCounter for Board {
//!     fn reset(&mut self) {
//!         self.counter.reset();
//!     }
//!     fn cycles(&self) -> u32 {
//!         self.counter.cycles()
//!     }
//! }
//!
//! impl Platform for Board {
//!     fn spin(&mut self, cycles: u32) {
//!         for _ in 0..cycles {
//!             core::hint::spin_loop();
//!         }
//!     }
//!     fn signal_host(&mut self) {
//!         // raise the core-to-host event here
//!     }
//!     fn halt(&mut self) -> ! {
//!         loop {
//!             core::hint::spin_loop();
//!         }
//!     }
//! }
//!
//! static CONTROL: ControlBlock = ControlBlock::new();
//!
//! let board = Board {
//!     gpio: unsafe { MmioGpio::am335x() },
//!     counter: unsafe { MmioCycleCounter::new(0x0002_2000) },
//! };
//! let memory = unsafe { PhysicalMemory::new() };
//! Driver::new(board, memory, Config::DEFAULT).run(&CONTROL);
//! ```
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and logs state changes and
//! frame reports with `defmt` between frames. Nothing is logged while bits are
//! being emitted.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use embedded_graphics::pixelcolor::Rgb888;

pub mod control;
pub mod driver;
pub mod emitter;
pub mod encoder;
pub mod hal;
pub mod mapping;
pub mod pixel;
pub mod sequencer;
pub mod timing;

#[cfg(test)]
mod trace;

pub use control::{ControlBlock, Response};
pub use driver::{Driver, Poll};
pub use mapping::ChannelMap;
pub use pixel::{PixelBuffer, PixelRow};
pub use timing::Timing;

/// Color type used for pixels
pub type Color = Rgb888;

/// Number of parallel output channels (strips).
pub const CHANNELS: usize = 24;

/// Data bits sent per channel and pixel.
pub const BITS_PER_CHANNEL: u8 = 24;

/// Fixed configuration of the waveform core.
///
/// Both parts are meant to be `const` items: the pin mapping and the timing
/// never change while the core runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Channel to pin mapping
    pub map: ChannelMap,
    /// Bit cell timing
    pub timing: Timing,
}

impl Config {
    /// Reference pin layout with WS2811 timing on a 200 MHz core.
    pub const DEFAULT: Self = Self {
        map: ChannelMap::REFERENCE,
        timing: Timing::DEFAULT,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Bit cells needed to send `rows` rows, saturating at `u32::MAX`.
#[must_use]
pub const fn compute_bit_cells(rows: u32) -> u32 {
    rows.saturating_mul(BITS_PER_CHANNEL as u32)
}

/// Bytes a frame of `rows` rows occupies in the pixel buffer.
#[must_use]
pub const fn compute_frame_bytes(rows: usize) -> usize {
    rows * pixel::ROW_BYTES
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use embedded_graphics::pixelcolor::RgbColor;

    #[test]
    fn test_compute_bit_cells() {
        assert_eq!(compute_bit_cells(0), 0);
        assert_eq!(compute_bit_cells(1), 24);
        assert_eq!(compute_bit_cells(512), 12_288);
        assert_eq!(compute_bit_cells(178_956_971), u32::MAX);
        assert_eq!(compute_bit_cells(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_compute_frame_bytes() {
        assert_eq!(compute_frame_bytes(0), 0);
        assert_eq!(compute_frame_bytes(1), 96);
        assert_eq!(compute_frame_bytes(60), 5_760);
        assert_eq!(compute_frame_bytes(60), PixelBuffer::<60>::size_bytes());
    }

    #[test]
    fn test_helper_functions_const() {
        const ROWS: usize = 144;
        const BYTES: usize = compute_frame_bytes(ROWS);
        const CELLS: u32 = compute_bit_cells(ROWS as u32);

        assert_eq!(BYTES, 13_824);
        assert_eq!(CELLS, 3_456);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config, Config::DEFAULT);
        assert_eq!(config.map, ChannelMap::REFERENCE);
        assert_eq!(config.timing, Timing::DEFAULT);
    }

    #[test]
    fn test_color_type_alias() {
        let red: Color = Color::RED;
        assert_eq!(red, Rgb888::RED);
        assert_eq!(red.r(), 255);
        assert_eq!(red.g(), 0);
        assert_eq!(red.b(), 0);
    }

    #[test]
    fn test_bits_per_channel_matches_colour_depth() {
        assert_eq!(usize::from(BITS_PER_CHANNEL), 3 * 8);
        assert_eq!(CHANNELS * pixel::BYTES_PER_CHANNEL, pixel::ROW_BYTES);
    }
}
