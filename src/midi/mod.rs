// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI I/O abstraction layer.
//!
//! Only the message level lives here: byte constants, a parser for the
//! realtime clock set, and byte sinks. The clock talks to MIDI through
//! [`MidiClockSender`] (outbound) and [`MidiClockRouter`] (inbound), so any
//! backend that can move raw bytes works.

pub mod message;
#[cfg(feature = "hardware-midi")]
pub mod midir_backend;
pub mod router;
pub mod sender;

use std::fmt;

use anyhow::Result;

pub use message::MidiMessage;
#[cfg(feature = "hardware-midi")]
pub use midir_backend::{list_inputs, list_outputs, print_ports, MidirInput, MidirOutput};
pub use router::MidiClockRouter;
pub use sender::{MidiCapture, MidiClockSender};

/// Trait for MIDI output implementations.
///
/// Clock bytes are sent the moment the clock produces them, so a backend
/// only has to move raw bytes.
pub trait MidiOutput: Send {
    /// Send a MIDI message immediately.
    ///
    /// # Arguments
    /// * `message` - Raw MIDI bytes (e.g., `[0xF8]` for Timing Clock)
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err` if the message could not be sent
    fn send(&mut self, message: &[u8]) -> Result<()>;
}

impl<T: MidiOutput + ?Sized> MidiOutput for Box<T> {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        (**self).send(message)
    }
}

/// Physical transport a MIDI message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiSource {
    Usb,
    Trs,
    /// Software port (host-side virtual device)
    Virtual,
}

impl fmt::Display for MidiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiSource::Usb => write!(f, "USB"),
            MidiSource::Trs => write!(f, "TRS"),
            MidiSource::Virtual => write!(f, "virtual"),
        }
    }
}

/// MIDI message constants
pub mod messages {
    // Channel Voice Messages (upper nibble, lower nibble is channel 0-15)
    pub const CONTROL_CHANGE: u8 = 0xB0;

    // Channel Mode controller numbers
    pub const CC_RESET_ALL_CONTROLLERS: u8 = 121;

    // System Real-Time Messages
    pub const TIMING_CLOCK: u8 = 0xF8;
    pub const START: u8 = 0xFA;
    pub const CONTINUE: u8 = 0xFB;
    pub const STOP: u8 = 0xFC;
}
