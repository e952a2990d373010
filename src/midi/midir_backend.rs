// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Cross-platform MIDI backend built on midir.

use std::sync::mpsc::{self, Receiver};

use anyhow::{anyhow, Result};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput as MidirPorts, MidiOutputConnection};

use super::{MidiMessage, MidiOutput, MidiSource};

const CLIENT_NAME: &str = "polyclock";

/// midir output connection
pub struct MidirOutput {
    connection: MidiOutputConnection,
}

impl MidirOutput {
    /// Connect to the output port at `port_index` (see [`list_outputs`])
    pub fn new(port_index: usize) -> Result<Self> {
        let midi_out = MidirPorts::new(CLIENT_NAME)
            .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;

        let ports = midi_out.ports();
        let port = ports.get(port_index).ok_or_else(|| {
            anyhow!(
                "MIDI destination {} not found (only {} available)",
                port_index,
                ports.len()
            )
        })?;

        let connection = midi_out
            .connect(port, "polyclock-out")
            .map_err(|e| anyhow!("Failed to connect to MIDI destination: {}", e))?;

        Ok(Self { connection })
    }
}

impl MidiOutput for MidirOutput {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        self.connection
            .send(message)
            .map_err(|e| anyhow!("Failed to send MIDI message: {}", e))
    }
}

/// midir input connection; parsed messages arrive on a channel
pub struct MidirInput {
    _connection: MidiInputConnection<()>,
    receiver: Receiver<(MidiSource, MidiMessage)>,
}

impl MidirInput {
    /// Connect to the input port at `port_index`, tagging messages with `source`
    pub fn new(port_index: usize, source: MidiSource) -> Result<Self> {
        let mut midi_in = MidiInput::new(CLIENT_NAME)
            .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;
        // Timing clock must come through
        midi_in.ignore(Ignore::SysexAndActiveSense);

        let ports = midi_in.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| anyhow!("MIDI source {} not found", port_index))?;

        let (tx, rx) = mpsc::channel();
        let connection = midi_in
            .connect(
                port,
                "polyclock-in",
                move |_timestamp_us, data, _| {
                    if let Some(message) = MidiMessage::parse(data) {
                        let _ = tx.send((source, message));
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to MIDI source: {}", e))?;

        Ok(Self {
            _connection: connection,
            receiver: rx,
        })
    }

    /// Try to receive the next MIDI message (non-blocking)
    pub fn try_recv(&self) -> Option<(MidiSource, MidiMessage)> {
        self.receiver.try_recv().ok()
    }
}

/// List all available MIDI output ports
pub fn list_outputs() -> Vec<(usize, String)> {
    let Ok(midi_out) = MidirPorts::new(CLIENT_NAME) else {
        return Vec::new();
    };
    midi_out
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            let name = midi_out.port_name(port).unwrap_or_else(|_| format!("Unknown {}", i));
            (i, name)
        })
        .collect()
}

/// List all available MIDI input ports
pub fn list_inputs() -> Vec<(usize, String)> {
    let Ok(midi_in) = MidiInput::new(CLIENT_NAME) else {
        return Vec::new();
    };
    midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            let name = midi_in.port_name(port).unwrap_or_else(|_| format!("Unknown {}", i));
            (i, name)
        })
        .collect()
}

/// Print all available MIDI ports to stdout
pub fn print_ports() {
    let outputs = list_outputs();
    if outputs.is_empty() {
        println!("No MIDI destinations found.");
    } else {
        println!("Available MIDI destinations (outputs):");
        for (i, name) in outputs {
            println!("  {}: {}", i, name);
        }
    }

    let inputs = list_inputs();
    if inputs.is_empty() {
        println!("No MIDI sources found.");
    } else {
        println!("Available MIDI sources (inputs):");
        for (i, name) in inputs {
            println!("  {}: {}", i, name);
        }
    }
}
