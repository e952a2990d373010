// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tick-domain constants for the clock, derived once from a [`ClockConfig`].

use crate::config::ClockConfig;
use crate::util::{pot, CurveMap};

/// Allowed external clock dividers and multipliers
pub const DIVIDERS_MULTIPLIERS: [u8; 4] = [1, 2, 4, 8];

/// Allowed MIDI dividers in MIDI pulses per cycle
pub const MIDI_TEMPO_DIVIDERS: [u32; 5] = [
    24, // quarter note
    12, // 8th note
    6,  // 16th note
    3,  // 32nd note
    1,  // 1:1 clock
];

/// MIDI divider used until the pot or storage says otherwise
pub const MIDI_TEMPO_DIVIDER_DEFAULT: u32 = 6;

/// Cycle-start lookahead for the internal clock (ticks)
pub const INTERNAL_LOOKAHEAD_TICKS: u32 = 2;
/// Cycle-start lookahead for the synced clocks (ticks)
pub const SYNCED_LOOKAHEAD_TICKS: u32 = 3;

/// Timing thresholds of the clock, all in ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTimings {
    pub sample_rate: f32,
    pub sync_out_ticks: u32,
    pub tap_min_ticks: u32,
    pub tap_max_ticks: u32,
    pub tap_just_happened_ticks: u32,
    pub tap_multiplier: u32,
    pub ext_probably_stopped_ticks: u32,
    pub pot_change_threshold: i32,
    pub midi_unavailable_multiplier: u32,
    pub midi_unavailable_floor_ticks: u32,
    pub midi_output_pulses: u32,
    pub reliable_jack_detect: bool,
    /// Raw pot reading -> internal cycle length
    pub tempo_curve: CurveMap<5>,
}

impl ClockTimings {
    /// Default timings at the given tick rate
    pub fn new(sample_rate: f32) -> Self {
        Self::from_config(&ClockConfig::with_sample_rate(sample_rate))
    }

    pub fn from_config(config: &ClockConfig) -> Self {
        let rate = config.sample_rate;
        let seconds = |s: f32| (s * rate) as u32;

        let mut input = [0i32; 5];
        let mut output = [0u32; 5];
        for (i, point) in config.tempo_curve.iter().enumerate() {
            input[i] = pot(point.pot);
            output[i] = ticks_for_hz(rate, point.hz);
        }

        Self {
            sample_rate: rate,
            sync_out_ticks: config.sync_out_ticks,
            tap_min_ticks: seconds(config.tap_min_seconds),
            tap_max_ticks: seconds(config.tap_max_seconds),
            tap_just_happened_ticks: seconds(config.tap_just_happened_seconds),
            tap_multiplier: config.tap_tempo_multiplier.max(1),
            ext_probably_stopped_ticks: seconds(config.ext_probably_stopped_seconds),
            pot_change_threshold: config.pot_change_threshold,
            midi_unavailable_multiplier: config.midi_unavailable_multiplier.max(1),
            midi_unavailable_floor_ticks: config.midi_unavailable_floor_ticks,
            midi_output_pulses: config.midi_output_pulses_per_cycle.max(1),
            reliable_jack_detect: config.reliable_jack_detect,
            tempo_curve: CurveMap::new(input, output),
        }
    }

    /// Cycle length in ticks for a frequency.
    ///
    /// Callers use it to turn a known tempo into a `set_tap_ticks` value;
    /// the tempo curve is built with the same conversion.
    pub fn hz_to_ticks(&self, hz: f32) -> u32 {
        ticks_for_hz(self.sample_rate, hz)
    }
}

fn ticks_for_hz(sample_rate: f32, hz: f32) -> u32 {
    ((sample_rate / hz) as u32).max(1)
}
