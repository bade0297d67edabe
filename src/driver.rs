//! Handshake state machine.
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            v                                              │
//!     AwaitCommand ──> Validate ──> Transmit ──> LatchDelay ──> ReportDone
//!                         │
//!                         └──> Exit (terminal)
//! ```
//!
//! - **AwaitCommand** raises the host signal once on entry, then polls the
//!   command word.
//! - **Validate** is entered with the frame parameters already copied, the
//!   response zeroed and the command cleared, before start and exit are told
//!   apart. The producer is free to prepare its next frame from here on.
//! - **Transmit** restarts the cycle counter and runs the frame sequencer. It
//!   always runs to completion.
//! - **LatchDelay** holds every line low long enough for the strips to latch.
//! - **ReportDone** publishes [`Response::done`] with the frame's cycle count
//!   and signals the host.
//! - **Exit** publishes [`Response::EXITED`], signals the host and leaves the
//!   core parked for good.
//!
//! [`Driver::run`] is the firmware entry point and never returns.
//! [`Driver::poll`] runs one pass so a host can drive the machine, and
//! [`Driver::step`] makes a single transition.

use crate::control::{Command, ControlBlock, FrameRequest, Response};
use crate::hal::Platform;
use crate::pixel::PixelMemory;
use crate::sequencer::{transmit_frame, FrameStats};
use crate::Config;

/// Handshake states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Waiting for the producer to publish a command
    AwaitCommand,
    /// A non-zero command arrived and has been cleared
    Validate(Command),
    /// Sending the frame
    Transmit,
    /// Holding the lines low so the strips latch
    LatchDelay,
    /// Publishing the frame report
    ReportDone,
    /// Terminal
    Exit,
}

impl State {
    /// Whether no further command will be processed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Exit)
    }
}

/// Report of one transmitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameReport {
    /// What went on the wire
    pub stats: FrameStats,
    /// Core cycles from the start of transmission to the end of the latch
    pub cycles: u32,
}

/// Outcome of one [`Driver::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Poll {
    /// No command pending
    Idle,
    /// A frame was sent and reported
    Frame(FrameReport),
    /// The core exited, now or earlier
    Exited,
}

/// Waveform core bound to a platform and a pixel memory.
#[derive(Debug)]
pub struct Driver<P, M> {
    platform: P,
    memory: M,
    config: Config,
    state: State,
    announced: bool,
    frame: FrameRequest,
    stats: FrameStats,
}

impl<P: Platform, M: PixelMemory> Driver<P, M> {
    /// Create a driver in [`State::AwaitCommand`].
    pub fn new(platform: P, memory: M, config: Config) -> Self {
        Self {
            platform,
            memory,
            config,
            state: State::AwaitCommand,
            announced: false,
            frame: FrameRequest::default(),
            stats: FrameStats::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Give back the platform and memory.
    pub fn into_parts(self) -> (P, M) {
        (self.platform, self.memory)
    }

    /// Serve `control` forever.
    ///
    /// A core that is not the controller parks at once without touching the
    /// control block or the bus. The controller serves commands until told to
    /// exit, then parks.
    pub fn run(mut self, control: &ControlBlock) -> ! {
        if !self.platform.is_controller() {
            #[cfg(feature = "defmt")]
            defmt::info!("not the controlling core, parking");
            self.platform.halt();
        }
        self.serve(control);
        self.platform.halt()
    }

    /// Serve commands until the exit command has been handled.
    pub fn serve(&mut self, control: &ControlBlock) {
        while self.poll(control) != Poll::Exited {}
    }

    /// Run the machine until a frame has been reported, no command is
    /// pending, or the core has exited.
    pub fn poll(&mut self, control: &ControlBlock) -> Poll {
        loop {
            if let Some(outcome) = self.step(control) {
                return outcome;
            }
        }
    }

    /// Make one state transition. Returns the outcome when the transition
    /// ends a [`Driver::poll`].
    pub fn step(&mut self, control: &ControlBlock) -> Option<Poll> {
        let (next, outcome) = match self.state {
            State::AwaitCommand => {
                if !self.announced {
                    self.platform.signal_host();
                    self.announced = true;
                }
                match control.command() {
                    0 => return Some(Poll::Idle),
                    raw => {
                        // parameters are taken and the last report withdrawn
                        // before the clear hands the block back to the producer
                        self.frame = control.frame();
                        control.respond(Response::PENDING);
                        control.clear_command();
                        (State::Validate(Command::from_raw(raw)), None)
                    }
                }
            }
            State::Validate(Command::Exit) => {
                control.respond(Response::EXITED);
                self.platform.signal_host();
                #[cfg(feature = "defmt")]
                defmt::info!("exit command, halting");
                (State::Exit, None)
            }
            State::Validate(_) => (State::Transmit, None),
            State::Transmit => {
                self.stats = self.transmit();
                (State::LatchDelay, None)
            }
            State::LatchDelay => {
                self.platform.spin(self.config.timing.latch_cycles());
                (State::ReportDone, None)
            }
            State::ReportDone => {
                let report = FrameReport {
                    stats: self.stats,
                    cycles: self.platform.cycles(),
                };
                control.respond(Response::done(report.cycles));
                self.platform.signal_host();
                #[cfg(feature = "defmt")]
                defmt::debug!("frame done: {}", report);
                self.announced = false;
                (State::AwaitCommand, Some(Poll::Frame(report)))
            }
            State::Exit => return Some(Poll::Exited),
        };
        self.state = next;
        #[cfg(feature = "defmt")]
        defmt::trace!("state -> {}", self.state);
        outcome
    }

    fn transmit(&mut self) -> FrameStats {
        let frame = self.frame;
        #[cfg(feature = "defmt")]
        defmt::debug!("transmitting {} rows from {=u32:#x}", frame.rows, frame.address);
        self.platform.reset();
        transmit_frame(
            &mut self.platform,
            &self.memory,
            &self.config,
            frame.address,
            frame.rows,
        )
    }
}
