// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The contract shared by every clock source, and the collaborators the
//! clock calls out to.

use crate::storage::PersistentStorage;

/// Availability of a clock source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// No usable signal (startup, or signal lost)
    Unavailable,
    /// Signal present and ticking
    Running,
    /// Halted by transport or user but still the selected reference
    Stopped,
}

/// Outbound MIDI clock contract
pub trait MidiTransport {
    fn send_clock_start(&mut self);
    fn send_clock_stop(&mut self);
    fn send_clock_pulse(&mut self);

    /// Realign downstream gear: a stop followed by a start
    fn send_clock_reset(&mut self) {
        self.send_clock_stop();
        self.send_clock_start();
    }

    /// Incoming MIDI clock has gone away
    fn report_disconnected(&mut self);
}

/// Downstream step sequencer contract
pub trait SequencerLink {
    /// Jump to an absolute step instead of restarting the pattern
    fn realign_to(&mut self, step: u32);
}

/// Everything the clock talks to while processing
pub trait ClockHost: MidiTransport + SequencerLink {}

impl<T: MidiTransport + SequencerLink> ClockHost for T {}

/// Host that ignores every call
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl MidiTransport for NullHost {
    fn send_clock_start(&mut self) {}
    fn send_clock_stop(&mut self) {}
    fn send_clock_pulse(&mut self) {}
    fn report_disconnected(&mut self) {}
}

impl SequencerLink for NullHost {
    fn realign_to(&mut self, _step: u32) {}
}

/// A time reference the [`Clock`](super::Clock) can follow.
///
/// Every method is O(1) and allocation-free; `process` is called once per
/// tick for every source, selected or not, so a source that gets selected
/// later already has the right phase.
pub trait ClockSource {
    /// Reset counters and run from the start of a cycle
    fn start(&mut self);

    /// Freeze tick advancement, keeping the position
    fn stop(&mut self);

    /// Continue from the current position
    fn resume(&mut self);

    /// True for exactly one `process` call after the cycle was realigned
    fn is_now_reset(&self) -> bool;

    /// Map a raw 0-4095 pot reading onto this source's tempo parameter
    fn set_pot(&mut self, pot_value: i32, host: &mut dyn ClockHost);

    /// Sync jack state; only sources reading the jack care
    fn set_sync_jack_plugged(&mut self, _plugged: bool) {}

    /// Advance by one tick
    fn process(&mut self, raw_sync_input: bool, midi_pulse_input: bool, host: &mut dyn ClockHost);

    /// Follow a tapped interval as closely as this source allows
    fn set_tap_ticks(&mut self, tap_ticks: u32);

    /// Length of the current cycle (0 = not known yet)
    fn target_ticks(&self) -> u32;

    /// Ticks elapsed in the current cycle
    fn current_ticks(&self) -> u32;

    fn save_to_memory(&self, storage: &mut dyn PersistentStorage);

    fn load_from_memory(&mut self, storage: &dyn PersistentStorage);

    /// True a few ticks before the cycle boundary
    fn is_reaching_next_cycle(&self) -> bool;

    fn state(&self) -> SourceState;

    /// The tap button was pressed; `force` restarts the cycle regardless of
    /// how recently it started
    fn tap_resets_ticks(&mut self, force: bool, host: &mut dyn ClockHost);

    /// Cycles since the last reset, for sequencer realignment
    fn total_steps(&self) -> u32;
}
