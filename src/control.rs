//! Shared control block: the handshake between the frame producer and the
//! waveform core.
//!
//! # Layout
//! Four 32-bit words at fixed offsets, 16 bytes in total:
//!
//! | Offset | Field    | Written by                 |
//! |--------|----------|----------------------------|
//! | 0      | pixels   | producer                   |
//! | 4      | rows     | producer                   |
//! | 8      | command  | producer, cleared by core  |
//! | 12     | response | core                       |
//!
//! # Protocol
//! 1. The producer fills a pixel buffer, stores its bus address and row count,
//!    then stores a non-zero command.
//! 2. The core copies address and row count, zeroes the response, then clears
//!    the command *before* looking at what it was. Once the producer sees the
//!    clear it may start preparing the next frame in its other buffer and
//!    publish its parameters.
//! 3. A start command (anything but `0xFF`) transmits the frame; the core then
//!    stores a [`Response`] with status [`Status::Done`] and the frame's cycle
//!    count. `0xFF` makes the core store [`Response::EXITED`] and halt.
//!
//! The core zeroes the response before it clears the command. Once the
//! producer sees the clear, the response reads 0 until the frame is done, so a
//! stale report of the previous frame is never mistaken for the new one.
//!
//! Command and response each have one writer (apart from the clear) and are
//! plain atomics; no lock is involved.

use core::sync::atomic::{fence, AtomicU32, Ordering};

use bitfield::bitfield;

/// Raw command asking the core to exit.
pub const COMMAND_EXIT: u32 = 0xFF;

/// Raw command conventionally used to start a frame.
pub const COMMAND_START: u32 = 0x01;

/// Decoded command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Nothing to do
    Idle,
    /// Transmit the published frame; carries the raw value
    Start(u32),
    /// Stop for good
    Exit,
}

impl Command {
    /// Decode a raw command word. Every value other than 0 and `0xFF` starts a
    /// frame.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Command::Idle,
            COMMAND_EXIT => Command::Exit,
            other => Command::Start(other),
        }
    }
}

/// Status byte of the response word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// No answer yet for the current command
    Pending,
    /// The frame has been sent and latched
    Done,
    /// The core has exited
    Exited,
    /// A status value this crate never writes
    Unknown(u8),
}

impl Status {
    const PENDING: u8 = 0x00;
    const DONE: u8 = 0x01;
    const EXITED: u8 = 0xFF;

    const fn from_raw(raw: u8) -> Self {
        match raw {
            Self::PENDING => Status::Pending,
            Self::DONE => Status::Done,
            Self::EXITED => Status::Exited,
            other => Status::Unknown(other),
        }
    }
}

bitfield! {
    /// Response word written by the core.
    ///
    /// The bit layout is as follows:
    /// - Bits 31-8: Cycle count of the last frame, saturated (done only)
    /// - Bits 7-0: Status
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Response(u32);
    impl Debug;
    pub u8, status_byte, set_status_byte: 7, 0;
    pub u32, cycles, set_cycles: 31, 8;
}

impl Response {
    /// Nothing reported yet.
    pub const PENDING: Self = Self(0);

    /// The core has exited.
    pub const EXITED: Self = Self(Status::EXITED as u32);

    /// Largest cycle count the response can carry.
    pub const MAX_CYCLES: u32 = (1 << 24) - 1;

    /// A frame finished after `cycles` core cycles. Counts that do not fit
    /// saturate at [`Response::MAX_CYCLES`].
    #[must_use]
    pub fn done(cycles: u32) -> Self {
        let mut response = Self(u32::from(Status::DONE));
        response.set_cycles(cycles.min(Self::MAX_CYCLES));
        response
    }

    /// Wrap a raw response word.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw word.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Decoded status.
    #[must_use]
    pub fn status(self) -> Status {
        Status::from_raw(self.status_byte())
    }

    /// Cycle count of a done frame, `None` for any other status.
    #[must_use]
    pub fn frame_cycles(self) -> Option<u32> {
        match self.status() {
            Status::Done => Some(self.cycles()),
            _ => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Response {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Response({}, cycles: {})", self.status(), self.cycles());
    }
}

/// The 16-byte shared handshake region.
#[derive(Debug, Default)]
#[repr(C)]
pub struct ControlBlock {
    pixels: AtomicU32,
    rows: AtomicU32,
    command: AtomicU32,
    response: AtomicU32,
}

const _: () = assert!(core::mem::size_of::<ControlBlock>() == 16);

/// Frame parameters read once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameRequest {
    /// Bus address of row 0
    pub address: u32,
    /// Rows in the frame
    pub rows: u32,
}

impl ControlBlock {
    /// A zeroed block.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pixels: AtomicU32::new(0),
            rows: AtomicU32::new(0),
            command: AtomicU32::new(0),
            response: AtomicU32::new(0),
        }
    }

    /// View the block placed at `address`.
    ///
    /// # Safety
    /// `address` must point at 16 bytes of memory, aligned to 4, that stay
    /// mapped for the rest of the program and are only accessed as this
    /// protocol describes.
    #[must_use]
    pub unsafe fn from_address(address: usize) -> &'static Self {
        &*(address as *const Self)
    }

    // core side

    /// Current raw command.
    #[inline]
    pub fn command(&self) -> u32 {
        self.command.load(Ordering::Acquire)
    }

    /// Accept the pending command: store 0 and make the clear visible before
    /// anything that follows, in particular the first pin write.
    #[inline]
    pub fn clear_command(&self) {
        self.command.store(0, Ordering::SeqCst);
        fence(Ordering::SeqCst);
    }

    /// Frame parameters as published by the producer.
    #[inline]
    pub fn frame(&self) -> FrameRequest {
        FrameRequest {
            address: self.pixels.load(Ordering::Acquire),
            rows: self.rows.load(Ordering::Acquire),
        }
    }

    /// Store a response.
    #[inline]
    pub fn respond(&self, response: Response) {
        self.response.store(response.raw(), Ordering::Release);
    }

    // producer side

    /// Publish a frame and ask the core to transmit it.
    ///
    /// The previous command must have been cleared by the core first.
    pub fn submit(&self, address: u32, rows: u32) {
        self.submit_raw(address, rows, COMMAND_START);
    }

    /// As [`ControlBlock::submit`] with an explicit command value.
    pub fn submit_raw(&self, address: u32, rows: u32, command: u32) {
        self.pixels.store(address, Ordering::Relaxed);
        self.rows.store(rows, Ordering::Relaxed);
        self.command.store(command, Ordering::Release);
    }

    /// Ask the core to exit once it is between frames.
    pub fn request_exit(&self) {
        self.command.store(COMMAND_EXIT, Ordering::Release);
    }

    /// Whether the core has taken the last command.
    pub fn is_accepted(&self) -> bool {
        self.command() == 0
    }

    /// Latest response.
    pub fn response(&self) -> Response {
        Response::from_raw(self.response.load(Ordering::Acquire))
    }
}
