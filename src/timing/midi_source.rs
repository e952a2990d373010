// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI clock (24 ppqn) as a clock source.
//!
//! A cycle is `beat_divider` incoming pulses. Divider changes wait for the
//! next pulse so a cycle is never cut in half.

use tracing::{debug, info, warn};

use crate::storage::{addr, PersistentStorage};
use crate::util::{map, POT_MAX, POT_MIN};

use super::params::{ClockTimings, MIDI_TEMPO_DIVIDERS, MIDI_TEMPO_DIVIDER_DEFAULT, SYNCED_LOOKAHEAD_TICKS};
use super::source::{ClockHost, ClockSource, SourceState};

#[derive(Debug, Clone)]
pub struct MidiClockSource {
    beat_divider: u32,
    /// Applied on the next incoming pulse
    pending_divider: Option<u32>,
    beat_count: u32,
    /// Pulses since start; saturates at `u32::MAX`
    beat_total: u32,

    current_ticks: u32,
    target_ticks: u32,
    now_reset: bool,
    just_started: bool,
    state: SourceState,
    first_sync: bool,

    /// Ticks since the last pulse, for liveness
    midi_ticks: u32,
    /// Pulse gap measured at the last completed cycle
    prev_midi_ticks: u32,

    unavailable_multiplier: u32,
    unavailable_floor_ticks: u32,
}

impl MidiClockSource {
    pub fn new(timings: &ClockTimings) -> Self {
        Self {
            beat_divider: MIDI_TEMPO_DIVIDER_DEFAULT,
            pending_divider: None,
            beat_count: 0,
            beat_total: 0,
            current_ticks: 0,
            target_ticks: 0,
            now_reset: false,
            just_started: false,
            state: SourceState::Unavailable,
            first_sync: true,
            midi_ticks: 0,
            prev_midi_ticks: 0,
            unavailable_multiplier: timings.midi_unavailable_multiplier,
            unavailable_floor_ticks: timings.midi_unavailable_floor_ticks,
        }
    }

    /// MIDI pulses per cycle
    pub fn divider(&self) -> u32 {
        self.beat_divider
    }

    pub fn pending_divider(&self) -> Option<u32> {
        self.pending_divider
    }

    /// Request a new divider; takes effect on the next pulse
    pub fn set_divider(&mut self, divider: u32) {
        self.pending_divider = (divider != self.beat_divider).then_some(divider);
    }

    fn clock_not_arriving(&self) -> bool {
        self.prev_midi_ticks > 0
            && self.midi_ticks >= self.unavailable_multiplier.saturating_mul(self.prev_midi_ticks)
            // Very fast clocks would otherwise flap
            && self.midi_ticks > self.unavailable_floor_ticks
    }

    fn disconnect(&mut self, host: &mut dyn ClockHost) {
        info!(silent_ticks = self.midi_ticks, "MIDI clock lost");
        self.state = SourceState::Unavailable;
        host.report_disconnected();
    }
}

impl ClockSource for MidiClockSource {
    fn start(&mut self) {
        self.state = SourceState::Running;
        self.beat_count = 0;
        self.beat_total = 0;
        self.current_ticks = 0;
        self.midi_ticks = 0;
        self.prev_midi_ticks = 0;
        self.first_sync = true;
        self.just_started = true;
        self.now_reset = false;
    }

    fn stop(&mut self) {
        self.state = SourceState::Stopped;
    }

    fn resume(&mut self) {
        self.state = SourceState::Running;
    }

    fn is_now_reset(&self) -> bool {
        self.now_reset
    }

    fn set_pot(&mut self, pot_value: i32, _host: &mut dyn ClockHost) {
        let steps = MIDI_TEMPO_DIVIDERS.len() as i64;
        let index = map(pot_value as i64, POT_MIN as i64, POT_MAX as i64 + 10, 0, steps).clamp(0, steps - 1);
        self.set_divider(MIDI_TEMPO_DIVIDERS[index as usize]);
    }

    fn process(&mut self, _raw_sync_input: bool, midi_pulse_input: bool, host: &mut dyn ClockHost) {
        self.now_reset = false;
        if self.just_started {
            // Announce the start without counting this tick
            self.now_reset = true;
            self.just_started = false;
            return;
        }

        self.current_ticks = self.current_ticks.saturating_add(1);
        self.midi_ticks = self.midi_ticks.saturating_add(1);

        if self.state == SourceState::Running && self.clock_not_arriving() {
            self.disconnect(host);
            return;
        }

        if !midi_pulse_input {
            return;
        }

        if let Some(divider) = self.pending_divider.take() {
            self.beat_divider = divider;
            self.target_ticks = self.midi_ticks.saturating_mul(divider);
            debug!(divider, "MIDI clock divider applied");
            // A saturated total no longer says where the pattern is
            if self.beat_total < u32::MAX {
                self.beat_count = self.beat_total % divider;
                host.realign_to(self.beat_total / divider);
            }
        }

        self.beat_count += 1;
        self.beat_total = self.beat_total.saturating_add(1);

        if self.beat_count >= self.beat_divider {
            if !self.first_sync {
                self.prev_midi_ticks = self.midi_ticks;
                self.target_ticks = self.current_ticks;
                // Some devices send clock while stopped; only leave
                // Unavailable, never override a transport stop
                if self.state == SourceState::Unavailable {
                    debug!(target_ticks = self.target_ticks, "MIDI clock running");
                    self.state = SourceState::Running;
                }
            }
            self.beat_count = 0;
            self.current_ticks = 0;
        }
        self.midi_ticks = 0;
        self.first_sync = false;
    }

    fn set_tap_ticks(&mut self, tap_ticks: u32) {
        if self.state != SourceState::Running {
            return;
        }
        let closest = MIDI_TEMPO_DIVIDERS
            .iter()
            .copied()
            .min_by_key(|&divider| self.prev_midi_ticks.saturating_mul(divider).abs_diff(tap_ticks))
            .unwrap_or(MIDI_TEMPO_DIVIDER_DEFAULT);
        self.set_divider(closest);
    }

    fn target_ticks(&self) -> u32 {
        self.target_ticks
    }

    fn current_ticks(&self) -> u32 {
        self.current_ticks
    }

    fn save_to_memory(&self, storage: &mut dyn PersistentStorage) {
        storage.queue_update8(addr::CLOCK_MIDI_DIVIDER, self.beat_divider as u8);
    }

    fn load_from_memory(&mut self, storage: &dyn PersistentStorage) {
        let Some(stored) = storage.read8(addr::CLOCK_MIDI_DIVIDER) else {
            return;
        };
        if MIDI_TEMPO_DIVIDERS.contains(&(stored as u32)) {
            self.beat_divider = stored as u32;
            self.pending_divider = None;
        } else {
            warn!(divider = stored, "ignoring stored MIDI divider");
        }
    }

    fn is_reaching_next_cycle(&self) -> bool {
        self.current_ticks.saturating_add(SYNCED_LOOKAHEAD_TICKS) >= self.target_ticks
    }

    fn state(&self) -> SourceState {
        self.state
    }

    fn tap_resets_ticks(&mut self, _force: bool, host: &mut dyn ClockHost) {
        // Tapping never moves MIDI phase; it only confirms a dead clock
        if self.state == SourceState::Stopped && self.clock_not_arriving() {
            self.disconnect(host);
        }
    }

    fn total_steps(&self) -> u32 {
        self.beat_total / self.beat_divider
    }
}
