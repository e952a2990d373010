// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Outbound MIDI clock on top of any [`MidiOutput`].

use anyhow::Result;
use tracing::{info, warn};

use super::{messages, MidiOutput};
use crate::timing::MidiTransport;

/// Sends the clock's transport and pulse messages as MIDI bytes.
///
/// Send failures are logged and counted, never returned: the clock runs
/// on the audio path and has nowhere to propagate them to.
pub struct MidiClockSender<O: MidiOutput> {
    output: O,
    /// Channel for channel-mode messages, 0-15
    channel: u8,
    send_errors: u64,
}

impl<O: MidiOutput> MidiClockSender<O> {
    /// `channel` is 1-16 as shown to users
    pub fn new(output: O, channel: u8) -> Self {
        Self {
            output,
            channel: channel.clamp(1, 16) - 1,
            send_errors: 0,
        }
    }

    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn into_inner(self) -> O {
        self.output
    }

    fn send(&mut self, message: &[u8]) {
        if let Err(e) = self.output.send(message) {
            self.send_errors += 1;
            // First failure loud, the rest would flood at clock rate
            if self.send_errors == 1 {
                warn!(error = %e, status = ?message.first(), "MIDI send failed");
            }
        }
    }
}

impl<O: MidiOutput> MidiTransport for MidiClockSender<O> {
    fn send_clock_start(&mut self) {
        self.send(&[messages::START]);
    }

    fn send_clock_stop(&mut self) {
        self.send(&[messages::STOP]);
    }

    fn send_clock_pulse(&mut self) {
        self.send(&[messages::TIMING_CLOCK]);
    }

    fn report_disconnected(&mut self) {
        info!(channel = self.channel + 1, "reporting MIDI clock disconnect");
        self.send(&[
            messages::CONTROL_CHANGE | self.channel,
            messages::CC_RESET_ALL_CONTROLLERS,
            0,
        ]);
    }
}

/// In-memory output that keeps every message, for offline runs
#[derive(Debug, Default, Clone)]
pub struct MidiCapture {
    messages: Vec<Vec<u8>>,
}

impl MidiCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Vec<u8>] {
        &self.messages
    }

    /// Number of captured messages starting with `status`
    pub fn count(&self, status: u8) -> usize {
        self.messages.iter().filter(|m| m.first() == Some(&status)).count()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl MidiOutput for MidiCapture {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        self.messages.push(message.to_vec());
        Ok(())
    }
}
