// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! External clock from the sync input jack (or patchbay).
//!
//! The incoming pulse train is jittery and may stop at any time. The period
//! is measured between edges and re-measured once per completed division
//! group, so a divided clock stays locked to the external phase rather than
//! to any single edge. Multiplication replays the measured sub-cycle
//! `multiplier` times per incoming pulse.

use tracing::{debug, warn};

use crate::storage::{addr, PersistentStorage};
use crate::util::{map, EdgeDetector, POT_HALF, POT_MIN};

use super::params::{ClockTimings, DIVIDERS_MULTIPLIERS, SYNCED_LOOKAHEAD_TICKS};
use super::source::{ClockHost, ClockSource, SourceState};

#[derive(Debug, Clone)]
pub struct ExternalClockSource {
    now_reset: bool,

    target_ticks: u32,
    current_ticks: u32,
    state: SourceState,

    /// Ticks since the last incoming edge
    ext_ticks: u32,
    /// Gap between the last two incoming edges
    prev_ext_ticks: u32,
    /// Saturates at `u32::MAX`
    total_input_trigs: u32,
    first_sync: bool,

    sync_jack_plugged: bool,
    sync_input: EdgeDetector,

    divider: u8,
    multiplier: u8,
    current_division: u32,
    current_multiplication: u32,

    probably_stopped_ticks: u32,
    tap_just_happened_ticks: u32,
    reliable_jack_detect: bool,
}

impl ExternalClockSource {
    pub fn new(timings: &ClockTimings) -> Self {
        Self {
            now_reset: false,
            target_ticks: 0,
            current_ticks: 0,
            state: SourceState::Unavailable,
            ext_ticks: 0,
            prev_ext_ticks: 0,
            total_input_trigs: 0,
            first_sync: true,
            sync_jack_plugged: false,
            sync_input: EdgeDetector::rising(),
            divider: 1,
            multiplier: 1,
            current_division: 0,
            current_multiplication: 0,
            probably_stopped_ticks: timings.ext_probably_stopped_ticks,
            tap_just_happened_ticks: timings.tap_just_happened_ticks,
            reliable_jack_detect: timings.reliable_jack_detect,
        }
    }

    pub fn divider(&self) -> u8 {
        self.divider
    }

    pub fn multiplier(&self) -> u8 {
        self.multiplier
    }

    /// Change the ratio and realign the sequencer to the equivalent step.
    ///
    /// Values outside the allowed set are rejected (returns false).
    pub fn set_ext_divider_multiplier(
        &mut self,
        divider: u8,
        multiplier: u8,
        host: &mut dyn ClockHost,
    ) -> bool {
        if !DIVIDERS_MULTIPLIERS.contains(&divider) || !DIVIDERS_MULTIPLIERS.contains(&multiplier) {
            return false;
        }
        if divider == self.divider && multiplier == self.multiplier {
            return true;
        }
        self.divider = divider;
        self.multiplier = multiplier;
        self.current_division %= divider as u32;
        self.current_multiplication %= multiplier as u32;
        debug!(divider, multiplier, "external clock ratio changed");
        host.realign_to(self.total_steps());
        true
    }

    fn update_availability(&mut self) {
        let previous = self.state;
        if !self.sync_jack_plugged {
            // Nothing patched: only give up once the pulses are really gone
            if self.ext_ticks > self.probably_stopped_ticks {
                self.state = SourceState::Unavailable;
            }
        } else if self.ext_ticks > self.probably_stopped_ticks
            || self.ext_ticks > self.prev_ext_ticks.saturating_mul(2)
        {
            self.state = SourceState::Stopped;
        }
        if self.state != previous {
            debug!(from = ?previous, to = ?self.state, "external clock state changed");
        }
    }
}

impl ClockSource for ExternalClockSource {
    fn start(&mut self) {
        self.state = SourceState::Running;
        self.current_ticks = 0;
        self.current_division = 0;
        self.current_multiplication = 0;
        self.total_input_trigs = 0;
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

    fn set_pot(&mut self, pot_value: i32, host: &mut dyn ClockHost) {
        // Left of center divides, right of center multiplies
        let distance = pot_value.abs_diff(POT_HALF) as i64;
        let steps = DIVIDERS_MULTIPLIERS.len() as i64;
        let index = map(distance, POT_MIN as i64, POT_HALF as i64 + 10, 0, steps).clamp(0, steps - 1);
        let ratio = DIVIDERS_MULTIPLIERS[index as usize];
        if pot_value < POT_HALF {
            self.set_ext_divider_multiplier(ratio, 1, host);
        } else {
            self.set_ext_divider_multiplier(1, ratio, host);
        }
    }

    fn set_sync_jack_plugged(&mut self, plugged: bool) {
        self.sync_jack_plugged = plugged;
        // Without a patchbay the jack switch is authoritative
        if self.reliable_jack_detect && !plugged && self.state != SourceState::Unavailable {
            debug!("sync jack unplugged, external clock unavailable");
            self.state = SourceState::Unavailable;
        }
    }

    fn process(&mut self, raw_sync_input: bool, _midi_pulse_input: bool, _host: &mut dyn ClockHost) {
        self.now_reset = false;
        self.ext_ticks = self.ext_ticks.saturating_add(1);
        self.current_ticks = self.current_ticks.saturating_add(1);

        if self.sync_input.process(raw_sync_input) {
            self.total_input_trigs = self.total_input_trigs.saturating_add(1);

            if self.first_sync {
                // No period known yet
                self.now_reset = true;
            } else if self.state == SourceState::Running && self.ext_ticks < self.probably_stopped_ticks {
                self.current_division += 1;
                if self.current_division >= self.divider as u32 {
                    let period = self.ext_ticks as u64 * self.divider as u64 / self.multiplier as u64;
                    self.target_ticks = period.min(u32::MAX as u64) as u32;
                    self.current_division = 0;
                    self.current_ticks = 0;
                    self.current_multiplication = 0;
                }
            } else {
                // Stale or stopped clock: start over on this edge
                self.start();
                self.now_reset = true;
            }

            self.prev_ext_ticks = self.ext_ticks;
            self.ext_ticks = 0;
            self.first_sync = false;
        }

        // Replay the sub-cycle until every multiplied repeat has played
        if self.current_ticks >= self.target_ticks
            && self.current_multiplication + 1 < self.multiplier as u32
        {
            self.current_multiplication += 1;
            self.current_ticks = 0;
        }

        self.update_availability();
    }

    fn set_tap_ticks(&mut self, tap_ticks: u32) {
        if self.target_ticks == 0 {
            // Nothing measured yet to derive a ratio from
            return;
        }
        let real_ext_ticks = (self.target_ticks as u64 * self.multiplier as u64
            / self.divider as u64)
            .min(u32::MAX as u64) as u32;
        let mut best = real_ext_ticks.abs_diff(tap_ticks);
        let mut index = 0;

        if tap_ticks == real_ext_ticks {
            self.divider = 1;
            self.multiplier = 1;
            self.target_ticks = real_ext_ticks;
        } else if tap_ticks > real_ext_ticks {
            for (i, &ratio) in DIVIDERS_MULTIPLIERS.iter().enumerate() {
                let result = real_ext_ticks.abs_diff(tap_ticks / ratio as u32);
                if result < best {
                    best = result;
                    index = i;
                }
            }
            self.divider = DIVIDERS_MULTIPLIERS[index];
            self.multiplier = 1;
            self.target_ticks = real_ext_ticks.saturating_mul(self.divider as u32);
            // Re-measure on the very next edge
            self.current_division = self.divider as u32 - 1;
            self.current_multiplication = 0;
        } else {
            for (i, &ratio) in DIVIDERS_MULTIPLIERS.iter().enumerate() {
                let result = real_ext_ticks.abs_diff(tap_ticks.saturating_mul(ratio as u32));
                if result < best {
                    best = result;
                    index = i;
                }
            }
            self.divider = 1;
            self.multiplier = DIVIDERS_MULTIPLIERS[index];
            self.target_ticks = real_ext_ticks / self.multiplier as u32;
        }
        debug!(
            divider = self.divider,
            multiplier = self.multiplier,
            "external clock ratio tapped"
        );
    }

    fn target_ticks(&self) -> u32 {
        self.target_ticks
    }

    fn current_ticks(&self) -> u32 {
        self.current_ticks
    }

    fn save_to_memory(&self, storage: &mut dyn PersistentStorage) {
        storage.queue_update8(addr::CLOCK_DIVIDER, self.divider);
        storage.queue_update8(addr::CLOCK_MULTIPLIER, self.multiplier);
    }

    fn load_from_memory(&mut self, storage: &dyn PersistentStorage) {
        if let Some(divider) = storage.read8(addr::CLOCK_DIVIDER) {
            if DIVIDERS_MULTIPLIERS.contains(&divider) {
                self.divider = divider;
            } else {
                warn!(divider, "ignoring stored external divider");
            }
        }
        if let Some(multiplier) = storage.read8(addr::CLOCK_MULTIPLIER) {
            if DIVIDERS_MULTIPLIERS.contains(&multiplier) {
                self.multiplier = multiplier;
            } else {
                warn!(multiplier, "ignoring stored external multiplier");
            }
        }
        self.current_division = 0;
        self.current_multiplication = 0;
    }

    fn is_reaching_next_cycle(&self) -> bool {
        self.current_ticks.saturating_add(SYNCED_LOOKAHEAD_TICKS) >= self.target_ticks
    }

    fn state(&self) -> SourceState {
        self.state
    }

    fn tap_resets_ticks(&mut self, force: bool, _host: &mut dyn ClockHost) {
        if force || self.current_ticks > self.tap_just_happened_ticks {
            self.current_ticks = 0;
        }
    }

    fn total_steps(&self) -> u32 {
        let steps = self.total_input_trigs as u64 * self.multiplier as u64 / self.divider as u64;
        steps.min(u32::MAX as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EepromImage;
    use crate::timing::source::{MidiTransport, NullHost, SequencerLink};
    use crate::util::{pot, POT_MAX};

    #[derive(Default)]
    struct Realigns(Vec<u32>);

    impl MidiTransport for Realigns {
        fn send_clock_start(&mut self) {}
        fn send_clock_stop(&mut self) {}
        fn send_clock_pulse(&mut self) {}
        fn report_disconnected(&mut self) {}
    }

    impl SequencerLink for Realigns {
        fn realign_to(&mut self, step: u32) {
            self.0.push(step);
        }
    }

    fn source() -> ExternalClockSource {
        let mut s = ExternalClockSource::new(&ClockTimings::new(1000.0));
        s.set_sync_jack_plugged(true);
        s
    }

    /// Run `period - 1` idle ticks then one tick with the input high
    fn pulse(s: &mut ExternalClockSource, period: u32) {
        for _ in 0..period - 1 {
            s.process(false, false, &mut NullHost);
        }
        s.process(true, false, &mut NullHost);
    }

    #[test]
    fn test_first_pulse_only_resets() {
        let mut s = source();
        pulse(&mut s, 50);
        assert!(s.is_now_reset());
        assert_eq!(s.target_ticks(), 0);

        s.process(false, false, &mut NullHost);
        assert!(!s.is_now_reset());
    }

    #[test]
    fn test_second_pulse_starts_clock() {
        let mut s = source();
        pulse(&mut s, 50);
        pulse(&mut s, 50);
        assert_eq!(s.state(), SourceState::Running);
        assert!(s.is_now_reset());
        assert_eq!(s.current_ticks(), 0);
    }

    #[test]
    fn test_period_measured() {
        let mut s = source();
        for _ in 0..3 {
            pulse(&mut s, 50);
        }
        assert_eq!(s.target_ticks(), 50);
        assert_eq!(s.state(), SourceState::Running);
        assert_eq!(s.current_ticks(), 0);
    }

    #[test]
    fn test_divider_needs_full_group() {
        let mut s = source();
        s.set_ext_divider_multiplier(2, 1, &mut NullHost);
        pulse(&mut s, 50);
        pulse(&mut s, 50);
        // One edge into the group: period not recomputed yet
        pulse(&mut s, 50);
        assert_ne!(s.target_ticks(), 100);
        pulse(&mut s, 50);
        assert_eq!(s.target_ticks(), 100);
        assert_eq!(s.current_ticks(), 0);
    }

    #[test]
    fn test_multiplier_repeats_sub_cycle() {
        let mut s = source();
        s.set_ext_divider_multiplier(1, 4, &mut NullHost);
        for _ in 0..3 {
            pulse(&mut s, 100);
        }
        assert_eq!(s.target_ticks(), 25);

        let mut wraps = 0;
        for _ in 0..99 {
            s.process(false, false, &mut NullHost);
            if s.current_ticks() == 0 {
                wraps += 1;
            }
        }
        // Three extra sub-cycles before the next incoming edge
        assert_eq!(wraps, 3);
    }

    #[test]
    fn test_slowdown_stops_clock() {
        let mut s = source();
        for _ in 0..3 {
            pulse(&mut s, 50);
        }
        for _ in 0..100 {
            s.process(false, false, &mut NullHost);
        }
        assert_eq!(s.state(), SourceState::Running);
        s.process(false, false, &mut NullHost);
        assert_eq!(s.state(), SourceState::Stopped);

        // The next edge restarts from the beat
        s.process(true, false, &mut NullHost);
        assert_eq!(s.state(), SourceState::Running);
        assert!(s.is_now_reset());
    }

    #[test]
    fn test_unplugged_goes_unavailable_after_timeout() {
        let mut s = ExternalClockSource::new(&ClockTimings::new(1000.0));
        for _ in 0..3 {
            pulse(&mut s, 50);
        }
        assert_eq!(s.state(), SourceState::Running);
        for _ in 0..2000 {
            s.process(false, false, &mut NullHost);
        }
        assert_eq!(s.state(), SourceState::Running);
        s.process(false, false, &mut NullHost);
        assert_eq!(s.state(), SourceState::Unavailable);
    }

    #[test]
    fn test_reliable_jack_detect_drops_immediately() {
        let mut config = crate::config::ClockConfig::with_sample_rate(1000.0);
        config.reliable_jack_detect = true;
        let mut s = ExternalClockSource::new(&ClockTimings::from_config(&config));
        s.set_sync_jack_plugged(true);
        for _ in 0..3 {
            pulse(&mut s, 50);
        }
        s.set_sync_jack_plugged(false);
        assert_eq!(s.state(), SourceState::Unavailable);
    }

    #[test]
    fn test_pot_selects_divider_and_multiplier() {
        let mut s = source();
        s.set_pot(POT_MIN, &mut NullHost);
        assert_eq!((s.divider(), s.multiplier()), (8, 1));
        s.set_pot(pot(0.3), &mut NullHost);
        assert_eq!((s.divider(), s.multiplier()), (2, 1));
        s.set_pot(POT_HALF, &mut NullHost);
        assert_eq!((s.divider(), s.multiplier()), (1, 1));
        s.set_pot(pot(0.8), &mut NullHost);
        assert_eq!((s.divider(), s.multiplier()), (1, 4));
        s.set_pot(POT_MAX, &mut NullHost);
        assert_eq!((s.divider(), s.multiplier()), (1, 8));
    }

    #[test]
    fn test_pot_out_of_range_clamps() {
        let mut s = source();
        s.set_pot(i32::MIN, &mut NullHost);
        assert_eq!((s.divider(), s.multiplier()), (8, 1));
        s.set_pot(i32::MAX, &mut NullHost);
        assert_eq!((s.divider(), s.multiplier()), (1, 8));
    }

    #[test]
    fn test_ratio_change_realigns_sequencer() {
        let mut s = source();
        for _ in 0..6 {
            pulse(&mut s, 50);
        }
        // Start() on the second edge cleared the count, four edges since
        assert_eq!(s.total_steps(), 4);

        let mut host = Realigns::default();
        s.set_ext_divider_multiplier(1, 2, &mut host);
        assert_eq!(host.0, vec![8]);

        // Same ratio again is a no-op
        s.set_ext_divider_multiplier(1, 2, &mut host);
        assert_eq!(host.0.len(), 1);

        assert!(!s.set_ext_divider_multiplier(3, 1, &mut host));
        assert_eq!(s.divider(), 1);
    }

    #[test]
    fn test_tap_slower_than_clock_divides() {
        let mut s = source();
        for _ in 0..3 {
            pulse(&mut s, 100);
        }
        s.set_tap_ticks(390);
        assert_eq!((s.divider(), s.multiplier()), (4, 1));
        assert_eq!(s.target_ticks(), 400);
    }

    #[test]
    fn test_tap_faster_than_clock_multiplies() {
        let mut s = source();
        for _ in 0..3 {
            pulse(&mut s, 100);
        }
        s.set_tap_ticks(48);
        assert_eq!((s.divider(), s.multiplier()), (1, 2));
        assert_eq!(s.target_ticks(), 50);
    }

    #[test]
    fn test_tap_matching_clock_resets_ratio() {
        let mut s = source();
        s.set_ext_divider_multiplier(2, 1, &mut NullHost);
        for _ in 0..4 {
            pulse(&mut s, 100);
        }
        assert_eq!(s.target_ticks(), 200);
        s.set_tap_ticks(100);
        assert_eq!((s.divider(), s.multiplier()), (1, 1));
        assert_eq!(s.target_ticks(), 100);
    }

    #[test]
    fn test_memory_rejects_values_outside_set() {
        let mut storage = EepromImage::new();
        storage.queue_update8(addr::CLOCK_DIVIDER, 3);
        storage.queue_update8(addr::CLOCK_MULTIPLIER, 4);
        storage.flush();

        let mut s = source();
        s.load_from_memory(&storage);
        assert_eq!(s.divider(), 1);
        assert_eq!(s.multiplier(), 4);
    }

    #[test]
    fn test_memory_round_trip() {
        let mut storage = EepromImage::new();
        let mut s = source();
        s.set_ext_divider_multiplier(8, 1, &mut NullHost);
        s.save_to_memory(&mut storage);
        storage.flush();

        let mut restored = source();
        restored.load_from_memory(&storage);
        assert_eq!(restored.divider(), 8);
        assert_eq!(restored.multiplier(), 1);
    }
}
