//! Pixel row layout shared between the frame producer and the waveform core.
//!
//! A frame is a run of contiguous [`PixelRow`]s. Each row carries one pixel for
//! every output channel, stored channel-major as four bytes per channel:
//!
//! | byte | 0     | 1   | 2    | 3      |
//! |------|-------|-----|------|--------|
//! | data | green | red | blue | unused |
//!
//! so a full row for [`CHANNELS`] channels is [`ROW_BYTES`] bytes long.
//!
//! The core reads a channel's four bytes as a big-endian [`ChannelWord`]. The
//! green MSB is then bit 31 and is the first bit on the wire; the unused byte
//! sits in bits 7-0 and is never transmitted.
//!
//! # Example
//! ```rust
//! use embedded_graphics::pixelcolor::RgbColor;
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{Line, PrimitiveStyle};
//! use ws281x_parallel::pixel::PixelBuffer;
//! use ws281x_parallel::Color;
//!
//! // 24 strips of 60 pixels each
//! let mut buffer = PixelBuffer::<60>::new();
//!
//! // light the first 10 pixels of strip 3 blue
//! Line::new(Point::new(3, 0), Point::new(3, 9))
//!     .into_styled(PrimitiveStyle::with_stroke(Color::BLUE, 1))
//!     .draw(&mut buffer)
//!     .unwrap();
//!
//! assert_eq!(buffer.row(9).word(3).blue(), 255);
//! ```

use core::convert::Infallible;

use bitfield::bitfield;
use embedded_dma::ReadBuffer;
use embedded_graphics::pixelcolor::RgbColor;
use embedded_graphics::prelude::{OriginDimensions, Point, Size};

use crate::{Color, BITS_PER_CHANNEL, CHANNELS};

/// Bytes stored per channel in a row.
pub const BYTES_PER_CHANNEL: usize = 4;

/// Bytes in one pixel row, also the stride between consecutive rows.
pub const ROW_BYTES: usize = CHANNELS * BYTES_PER_CHANNEL;

/// Word bits below the transmitted data (the unused byte).
const UNUSED_BITS: u8 = 8;

bitfield! {
    /// One channel's stored pixel read as a big-endian 32-bit word.
    ///
    /// The bit layout is as follows:
    /// - Bits 31-24: Green
    /// - Bits 23-16: Red
    /// - Bits 15-8: Blue
    /// - Bits 7-0: Unused
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct ChannelWord(u32);
    impl Debug;
    pub u8, green, set_green: 31, 24;
    pub u8, red, set_red: 23, 16;
    pub u8, blue, set_blue: 15, 8;
    pub u8, unused, set_unused: 7, 0;
}

impl ChannelWord {
    /// Word with every colour component off.
    pub const OFF: Self = Self(0);

    /// Wrap a raw word (green in the top byte).
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw 32-bit value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Build a word from the four bytes exactly as they sit in memory.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; BYTES_PER_CHANNEL]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    /// The four bytes as they sit in memory.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; BYTES_PER_CHANNEL] {
        self.0.to_be_bytes()
    }

    /// Build a word from a colour, unused byte zeroed.
    #[must_use]
    pub fn from_color(color: Color) -> Self {
        Self::from_bytes([color.g(), color.r(), color.b(), 0])
    }

    /// The colour carried by this word.
    #[must_use]
    pub fn color(self) -> Color {
        Color::new(self.red(), self.green(), self.blue())
    }

    /// Data bit `bit` (23 is sent first, 0 last).
    ///
    /// `bit` must be below [`BITS_PER_CHANNEL`].
    #[inline(always)]
    #[must_use]
    pub const fn data_bit(self, bit: u8) -> bool {
        debug_assert!(bit < BITS_PER_CHANNEL);
        (self.0 >> (bit + UNUSED_BITS)) & 1 != 0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelWord {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "ChannelWord(g: {}, r: {}, b: {})",
            self.green(),
            self.red(),
            self.blue()
        );
    }
}

/// One pixel for every channel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(C, align(4))]
pub struct PixelRow {
    channels: [[u8; BYTES_PER_CHANNEL]; CHANNELS],
}

impl PixelRow {
    /// Row with every channel off.
    pub const BLACK: Self = Self::new();

    /// Create a row with every channel off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channels: [[0; BYTES_PER_CHANNEL]; CHANNELS],
        }
    }

    /// Build a row from one word per channel.
    #[must_use]
    pub fn from_words(words: [ChannelWord; CHANNELS]) -> Self {
        let mut row = Self::new();
        for (channel, word) in words.into_iter().enumerate() {
            row.set_word(channel, word);
        }
        row
    }

    /// Load the word for `channel`.
    ///
    /// # Panics
    /// If `channel >= CHANNELS`.
    #[inline(always)]
    #[must_use]
    pub const fn word(&self, channel: usize) -> ChannelWord {
        ChannelWord::from_bytes(self.channels[channel])
    }

    /// All channel words in channel order.
    #[inline]
    #[must_use]
    pub fn words(&self) -> [ChannelWord; CHANNELS] {
        self.channels.map(ChannelWord::from_bytes)
    }

    /// Store the word for `channel`. Out-of-range channels are ignored.
    pub fn set_word(&mut self, channel: usize, word: ChannelWord) {
        if let Some(slot) = self.channels.get_mut(channel) {
            *slot = word.to_bytes();
        }
    }

    /// Store a colour for `channel`. Out-of-range channels are ignored.
    pub fn set_color(&mut self, channel: usize, color: Color) {
        self.set_word(channel, ChannelWord::from_color(color));
    }

    /// The row as raw bytes, in memory order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ROW_BYTES] {
        // SAFETY: `PixelRow` is `repr(C)` over `CHANNELS * BYTES_PER_CHANNEL` bytes
        // with no padding (size asserted below).
        unsafe { &*(self.channels.as_ptr().cast::<[u8; ROW_BYTES]>()) }
    }
}

impl Default for PixelRow {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = assert!(core::mem::size_of::<PixelRow>() == ROW_BYTES);

/// Source of pixel rows addressed the way the control block addresses them.
///
/// The core only ever knows the bus address of row 0 and walks forward by
/// [`ROW_BYTES`]. Implementations decide how an address becomes bytes.
pub trait PixelMemory {
    /// Load the whole row starting at `address`.
    fn load_row(&self, address: u32) -> PixelRow;
}

impl<M: PixelMemory + ?Sized> PixelMemory for &M {
    #[inline(always)]
    fn load_row(&self, address: u32) -> PixelRow {
        (**self).load_row(address)
    }
}

/// Pixel memory reached directly through bus addresses.
///
/// This is the memory view of the real-time core: the control block carries a
/// physical address and rows are read from it with volatile loads.
#[derive(Debug)]
pub struct PhysicalMemory {
    _private: (),
}

impl PhysicalMemory {
    /// Create the physical view.
    ///
    /// # Safety
    /// Every address later passed to [`PixelMemory::load_row`] must point at
    /// [`ROW_BYTES`] readable bytes in this core's address space, aligned to 4.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PixelMemory for PhysicalMemory {
    #[inline(always)]
    fn load_row(&self, address: u32) -> PixelRow {
        // SAFETY: upheld by the caller of `PhysicalMemory::new`.
        unsafe { core::ptr::read_volatile(address as usize as *const PixelRow) }
    }
}

/// A borrowed run of rows presented at a chosen bus address.
///
/// Lets the core run against ordinary memory, for example when the producer
/// and the core share one address space or in host-side tests. Loads outside
/// the borrowed rows come back black.
#[derive(Clone, Copy, Debug)]
pub struct MappedRows<'a> {
    base: u32,
    rows: &'a [PixelRow],
}

impl<'a> MappedRows<'a> {
    /// Present `rows` with row 0 at bus address `base`.
    #[must_use]
    pub const fn new(base: u32, rows: &'a [PixelRow]) -> Self {
        Self { base, rows }
    }

    /// Bus address of row 0.
    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Bus address of row `index`.
    #[must_use]
    pub const fn address_of(&self, index: usize) -> u32 {
        self.base.wrapping_add((index * ROW_BYTES) as u32)
    }
}

impl PixelMemory for MappedRows<'_> {
    fn load_row(&self, address: u32) -> PixelRow {
        let offset = address.wrapping_sub(self.base) as usize;
        if offset % ROW_BYTES != 0 {
            return PixelRow::BLACK;
        }
        self.rows
            .get(offset / ROW_BYTES)
            .copied()
            .unwrap_or(PixelRow::BLACK)
    }
}

/// DMA-visible frame of `ROWS` pixels per strip.
///
/// This is the producer-side view of the shared pixel buffer. Drawing uses
/// `embedded-graphics` with `x` selecting the strip (channel) and `y` the pixel
/// along the strip. [`ReadBuffer`] yields the address and length to publish
/// through the control block.
#[derive(Clone, Copy)]
#[repr(C)]
#[repr(align(4))]
pub struct PixelBuffer<const ROWS: usize> {
    rows: [PixelRow; ROWS],
}

impl<const ROWS: usize> Default for PixelBuffer<ROWS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize> PixelBuffer<ROWS> {
    /// Create a buffer with every pixel off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows: [PixelRow::new(); ROWS],
        }
    }

    /// Turn every pixel off.
    pub fn clear(&mut self) {
        self.rows.fill(PixelRow::BLACK);
    }

    /// Set pixel `p.y` of strip `p.x`. Points off the buffer are ignored.
    pub fn set_pixel(&mut self, p: Point, color: Color) {
        if p.x < 0 || p.y < 0 {
            return;
        }
        self.set_pixel_internal(p.x as usize, p.y as usize, color);
    }

    fn set_pixel_internal(&mut self, channel: usize, index: usize, color: Color) {
        if channel >= CHANNELS {
            return;
        }
        if let Some(row) = self.rows.get_mut(index) {
            row.set_color(channel, color);
        }
    }

    /// Row `index`.
    ///
    /// # Panics
    /// If `index >= ROWS`.
    #[must_use]
    pub fn row(&self, index: usize) -> &PixelRow {
        &self.rows[index]
    }

    /// Mutable row `index`.
    ///
    /// # Panics
    /// If `index >= ROWS`.
    pub fn row_mut(&mut self, index: usize) -> &mut PixelRow {
        &mut self.rows[index]
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[PixelRow] {
        &self.rows
    }

    /// Present this buffer to the core at bus address `base`.
    #[must_use]
    pub fn mapped_at(&self, base: u32) -> MappedRows<'_> {
        MappedRows::new(base, &self.rows)
    }

    /// Size of the buffer in bytes.
    #[must_use]
    pub const fn size_bytes() -> usize {
        ROWS * ROW_BYTES
    }
}

impl<const ROWS: usize> OriginDimensions for PixelBuffer<ROWS> {
    fn size(&self) -> Size {
        Size::new(CHANNELS as u32, ROWS as u32)
    }
}

impl<const ROWS: usize> embedded_graphics::draw_target::DrawTarget for PixelBuffer<ROWS> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.set_pixel(pixel.0, pixel.1);
        }
        Ok(())
    }
}

unsafe impl<const ROWS: usize> ReadBuffer for PixelBuffer<ROWS> {
    type Word = u8;

    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        let ptr = &self.rows as *const _ as *const u8;
        let len = core::mem::size_of_val(&self.rows);
        (ptr, len)
    }
}

unsafe impl<const ROWS: usize> ReadBuffer for &mut PixelBuffer<ROWS> {
    type Word = u8;

    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        let ptr = &self.rows as *const _ as *const u8;
        let len = core::mem::size_of_val(&self.rows);
        (ptr, len)
    }
}

impl<const ROWS: usize> core::fmt::Debug for PixelBuffer<ROWS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("rows", &ROWS)
            .field("size", &core::mem::size_of_val(&self.rows))
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<const ROWS: usize> defmt::Format for PixelBuffer<ROWS> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PixelBuffer<{}>", ROWS);
        defmt::write!(f, " size: {}", core::mem::size_of_val(&self.rows));
    }
}
