// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Parsing of the messages the clock cares about.

use super::messages;

/// Parsed MIDI message types
#[derive(Debug, Clone, PartialEq)]
pub enum MidiMessage {
    /// MIDI Clock tick (24 per quarter note)
    TimingClock,
    /// Start playback from the top
    Start,
    /// Continue playback
    Continue,
    /// Stop playback
    Stop,
    /// Control Change: channel (0-15), controller (0-127), value (0-127)
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Anything else, kept raw
    Unknown(Vec<u8>),
}

impl MidiMessage {
    /// Parse raw MIDI bytes into a MidiMessage
    pub fn parse(data: &[u8]) -> Option<Self> {
        let &status = data.first()?;

        // System Real-Time messages (single byte)
        match status {
            messages::TIMING_CLOCK => return Some(MidiMessage::TimingClock),
            messages::START => return Some(MidiMessage::Start),
            messages::CONTINUE => return Some(MidiMessage::Continue),
            messages::STOP => return Some(MidiMessage::Stop),
            _ => {}
        }

        let msg_type = status & 0xF0;
        let channel = status & 0x0F;

        match msg_type {
            messages::CONTROL_CHANGE if data.len() >= 3 => Some(MidiMessage::ControlChange {
                channel,
                controller: data[1] & 0x7F,
                value: data[2] & 0x7F,
            }),
            _ => Some(MidiMessage::Unknown(data.to_vec())),
        }
    }

    /// Check if this is a clock-related message
    pub fn is_clock_message(&self) -> bool {
        matches!(
            self,
            MidiMessage::TimingClock | MidiMessage::Start | MidiMessage::Continue | MidiMessage::Stop
        )
    }

    /// Raw bytes of the message
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MidiMessage::TimingClock => vec![messages::TIMING_CLOCK],
            MidiMessage::Start => vec![messages::START],
            MidiMessage::Continue => vec![messages::CONTINUE],
            MidiMessage::Stop => vec![messages::STOP],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => vec![
                messages::CONTROL_CHANGE | (channel & 0x0F),
                controller & 0x7F,
                value & 0x7F,
            ],
            MidiMessage::Unknown(data) => data.clone(),
        }
    }
}
