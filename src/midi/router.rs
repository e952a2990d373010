// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Inbound MIDI clock routing.
//!
//! MIDI arrives on the control path, the clock ticks on the audio path.
//! Clock bytes are latched here and handed to the next `Clock::process`;
//! transport messages act on the clock right away.

use tracing::trace;

use super::{MidiMessage, MidiSource};
use crate::timing::Clock;

#[derive(Debug, Default, Clone)]
pub struct MidiClockRouter {
    pulse_pending: bool,
    accepted: u64,
    rejected: u64,
}

impl MidiClockRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one message. Returns true when the clock used it.
    pub fn route(&mut self, clock: &mut Clock, source: MidiSource, message: &MidiMessage) -> bool {
        if !message.is_clock_message() {
            return false;
        }
        if !clock.check_midi_source(source) {
            trace!(%source, ?message, "MIDI clock from another transport dropped");
            self.rejected += 1;
            return false;
        }
        self.accepted += 1;

        match message {
            MidiMessage::TimingClock => self.pulse_pending = true,
            MidiMessage::Start => clock.start(),
            MidiMessage::Stop => clock.stop(),
            MidiMessage::Continue => clock.resume(),
            _ => {}
        }
        true
    }

    /// Parse and feed raw bytes
    pub fn route_bytes(&mut self, clock: &mut Clock, source: MidiSource, data: &[u8]) -> bool {
        match MidiMessage::parse(data) {
            Some(message) => self.route(clock, source, &message),
            None => false,
        }
    }

    /// The `midi_pulse_input` for the next tick; clears the latch
    pub fn take_pulse(&mut self) -> bool {
        std::mem::take(&mut self.pulse_pending)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
