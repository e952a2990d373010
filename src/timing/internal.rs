// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Free-running internal clock. Always available, so it is the fallback
//! when nothing is patched in.

use crate::storage::{addr, PersistentStorage};
use crate::util::CurveMap;

use super::params::{ClockTimings, INTERNAL_LOOKAHEAD_TICKS};
use super::source::{ClockHost, ClockSource, SourceState};

#[derive(Debug, Clone)]
pub struct InternalClockSource {
    target_ticks: u32,
    current_ticks: u32,
    /// Wraps; only differences matter downstream
    total_ticks: u32,
    total_steps: u32,
    tempo_curve: CurveMap<5>,
    tap_just_happened_ticks: u32,
}

impl InternalClockSource {
    pub fn new(timings: &ClockTimings) -> Self {
        Self {
            target_ticks: u32::MAX,
            current_ticks: 0,
            total_ticks: 0,
            total_steps: 0,
            tempo_curve: timings.tempo_curve,
            tap_just_happened_ticks: timings.tap_just_happened_ticks,
        }
    }

    /// Ticks processed since construction (wrapping)
    pub fn total_ticks(&self) -> u32 {
        self.total_ticks
    }
}

impl ClockSource for InternalClockSource {
    // The internal clock never stops and never realigns
    fn start(&mut self) {}

    fn stop(&mut self) {}

    fn resume(&mut self) {}

    fn is_now_reset(&self) -> bool {
        false
    }

    fn set_pot(&mut self, pot_value: i32, _host: &mut dyn ClockHost) {
        self.target_ticks = self.tempo_curve.map(pot_value).max(1);
    }

    fn process(&mut self, _raw_sync_input: bool, _midi_pulse_input: bool, _host: &mut dyn ClockHost) {
        self.current_ticks += 1;
        self.total_ticks = self.total_ticks.wrapping_add(1);
        if self.current_ticks >= self.target_ticks {
            self.current_ticks = 0;
            self.total_steps = self.total_steps.wrapping_add(1);
        }
    }

    fn set_tap_ticks(&mut self, tap_ticks: u32) {
        self.target_ticks = tap_ticks.max(1);
    }

    fn target_ticks(&self) -> u32 {
        self.target_ticks
    }

    fn current_ticks(&self) -> u32 {
        self.current_ticks
    }

    fn save_to_memory(&self, storage: &mut dyn PersistentStorage) {
        storage.queue_update32(addr::CLOCK_TICKS, self.target_ticks);
    }

    fn load_from_memory(&mut self, storage: &dyn PersistentStorage) {
        if let Some(ticks) = storage.read32(addr::CLOCK_TICKS) {
            if ticks > 0 {
                self.target_ticks = ticks;
            }
        }
    }

    fn is_reaching_next_cycle(&self) -> bool {
        self.current_ticks.saturating_add(INTERNAL_LOOKAHEAD_TICKS) >= self.target_ticks
    }

    fn state(&self) -> SourceState {
        SourceState::Running
    }

    fn tap_resets_ticks(&mut self, force: bool, _host: &mut dyn ClockHost) {
        // Ignore a second reset right after the first one (late double tap)
        if force || self.current_ticks > self.tap_just_happened_ticks {
            self.current_ticks = 0;
        }
    }

    fn total_steps(&self) -> u32 {
        self.total_steps
    }
}
