// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The clock facade.
//!
//! Owns the three sources, processes all of them every tick, and follows
//! the highest-priority one that is available (MIDI, then the sync jack,
//! then the internal oscillator). On top of the selected source it derives
//! the trigger, sync-out and half-duty outputs, runs tap tempo, guards the
//! tempo pot, and generates MIDI clock for downstream gear.

use tracing::{debug, trace};

use crate::config::ClockConfig;
use crate::midi::MidiSource;
use crate::storage::PersistentStorage;
use crate::util::{EdgeDetector, RunningAverage};

use super::external::ExternalClockSource;
use super::internal::InternalClockSource;
use super::midi_source::MidiClockSource;
use super::params::ClockTimings;
use super::source::{ClockHost, ClockSource, SourceState};

/// Window of the target-ticks and tap averages
const AVERAGE_WINDOW: usize = 8;

/// Which source the clock follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sync {
    Midi,
    External,
    Internal,
}

impl Sync {
    /// Highest priority first
    pub const PRIORITY: [Sync; 3] = [Sync::Midi, Sync::External, Sync::Internal];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapState {
    /// No tap tempo in effect
    None,
    /// One tap seen, outputs muted until the second
    WaitingForSecondTap,
    /// Tempo follows the taps
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PotState {
    /// Never read
    Undefined,
    /// Must move past the change threshold before it counts
    RequiresThreshold,
    /// Every change is forwarded
    Active,
}

/// Why a reset is waiting for the next cycle boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    SourceSwitch,
    Requested,
}

#[derive(Debug, Clone)]
pub struct Clock {
    timings: ClockTimings,

    internal: InternalClockSource,
    external: ExternalClockSource,
    midi: MidiClockSource,
    sync_type: Sync,

    now_reset: bool,
    pending_reset: Option<ResetCause>,

    half_duty_state: bool,
    sync_out_state: bool,
    avg_target_ticks: RunningAverage<AVERAGE_WINDOW>,

    tap_state: TapState,
    tap_ticks: u32,
    tap_edge: EdgeDetector,
    tap_values: RunningAverage<AVERAGE_WINDOW>,

    pot_state: PotState,
    prev_pot_value: i32,

    /// Transport the MIDI clock is being taken from
    midi_source: Option<MidiSource>,

    midi_prev_clock_state: SourceState,
    midi_pulses_sent: u32,
}

impl Clock {
    /// Clock with default timings at `sample_rate` ticks per second
    pub fn new(sample_rate: f32) -> Self {
        Self::with_timings(ClockTimings::new(sample_rate))
    }

    pub fn from_config(config: &ClockConfig) -> Self {
        Self::with_timings(ClockTimings::from_config(config))
    }

    pub fn with_timings(timings: ClockTimings) -> Self {
        Self {
            internal: InternalClockSource::new(&timings),
            external: ExternalClockSource::new(&timings),
            midi: MidiClockSource::new(&timings),
            timings,
            sync_type: Sync::Internal,
            now_reset: false,
            pending_reset: None,
            half_duty_state: false,
            sync_out_state: false,
            avg_target_ticks: RunningAverage::new(),
            tap_state: TapState::None,
            tap_ticks: 0,
            tap_edge: EdgeDetector::rising(),
            tap_values: RunningAverage::new(),
            pot_state: PotState::Undefined,
            prev_pot_value: 0,
            midi_source: None,
            midi_prev_clock_state: SourceState::Unavailable,
            midi_pulses_sent: 0,
        }
    }

    pub fn timings(&self) -> &ClockTimings {
        &self.timings
    }

    pub fn source(&self, sync: Sync) -> &dyn ClockSource {
        match sync {
            Sync::Midi => &self.midi,
            Sync::External => &self.external,
            Sync::Internal => &self.internal,
        }
    }

    fn source_mut(&mut self, sync: Sync) -> &mut dyn ClockSource {
        match sync {
            Sync::Midi => &mut self.midi,
            Sync::External => &mut self.external,
            Sync::Internal => &mut self.internal,
        }
    }

    fn active(&self) -> &dyn ClockSource {
        self.source(self.sync_type)
    }

    fn active_mut(&mut self) -> &mut dyn ClockSource {
        self.source_mut(self.sync_type)
    }

    pub fn internal(&self) -> &InternalClockSource {
        &self.internal
    }

    pub fn external(&self) -> &ExternalClockSource {
        &self.external
    }

    pub fn midi(&self) -> &MidiClockSource {
        &self.midi
    }

    /// Advance one tick. Returns true on the first tick of a cycle while
    /// the outputs are enabled.
    pub fn process(
        &mut self,
        raw_tap_input: bool,
        raw_sync_input: bool,
        midi_pulse_input: bool,
        host: &mut dyn ClockHost,
    ) -> bool {
        self.now_reset = false;

        // Every source keeps its phase, selected or not
        for sync in Sync::PRIORITY {
            self.source_mut(sync).process(raw_sync_input, midi_pulse_input, host);
        }

        let selected = Sync::PRIORITY
            .into_iter()
            .find(|&sync| self.source(sync).state() != SourceState::Unavailable)
            .unwrap_or(Sync::Internal);
        self.set_sync_type(selected);

        if self.sync_type != Sync::Midi {
            self.midi_source = None;
        }

        self.process_tap_tempo(raw_tap_input, host);

        let now_trigger = self.is_now_trigger();
        if now_trigger {
            self.half_duty_state = true;
            self.sync_out_state = true;
            self.avg_target_ticks.add(self.target_ticks());
        }
        if self.current_ticks() >= self.target_ticks() / 2 {
            self.half_duty_state = false;
        }
        if self.current_ticks() >= self.timings.sync_out_ticks {
            self.sync_out_state = false;
        }

        if now_trigger {
            if let Some(cause) = self.pending_reset.take() {
                trace!(?cause, "deferred reset");
                self.now_reset = true;
            }
        }

        self.handle_midi_out(host);

        now_trigger
    }

    fn set_sync_type(&mut self, sync_type: Sync) {
        if self.sync_type == sync_type {
            return;
        }
        debug!(from = ?self.sync_type, to = ?sync_type, "clock source switched");
        self.sync_type = sync_type;
        self.avg_target_ticks.reset();
        if self.pot_state == PotState::Active {
            self.pot_state = PotState::RequiresThreshold;
        }
        // Realign consumers on the next cycle, not mid-cycle
        self.pending_reset = Some(ResetCause::SourceSwitch);
    }

    fn process_tap_tempo(&mut self, raw_tap_input: bool, host: &mut dyn ClockHost) {
        self.tap_ticks = self.tap_ticks.saturating_add(1);

        if self.tap_state == TapState::WaitingForSecondTap && self.tap_ticks > self.timings.tap_max_ticks {
            debug!("tap tempo timed out");
            self.clear_taps();
        }

        let tapped = self.tap_edge.process(raw_tap_input);
        // Debounce
        if !tapped || self.tap_ticks <= self.timings.tap_min_ticks {
            return;
        }

        let force = self.tap_state == TapState::WaitingForSecondTap;
        self.active_mut().tap_resets_ticks(force, host);

        if self.tap_ticks <= self.timings.tap_max_ticks && self.tap_state != TapState::None {
            self.tap_values.add(self.tap_ticks);
            self.tap_state = TapState::Active;
            let tap_ticks = self.tap_values.median() / self.timings.tap_multiplier;
            debug!(tap_ticks, source = ?self.sync_type, "tap tempo");
            self.active_mut().set_tap_ticks(tap_ticks);
            self.pot_state = PotState::RequiresThreshold;
        } else {
            self.clear_taps();
            self.tap_state = TapState::WaitingForSecondTap;
        }
        self.tap_ticks = 0;
    }

    fn handle_midi_out(&mut self, host: &mut dyn ClockHost) {
        // No loopback of a received clock
        if self.sync_type == Sync::Midi {
            return;
        }

        if self.sync_type == Sync::External {
            let state = self.external.state();
            if state == SourceState::Running && self.midi_prev_clock_state != SourceState::Running {
                host.send_clock_start();
            }
            if state == SourceState::Stopped && self.midi_prev_clock_state != SourceState::Stopped {
                host.send_clock_stop();
            }
            self.midi_prev_clock_state = state;
        }

        if self.is_now_trigger() {
            self.midi_pulses_sent = 0;
            if self.is_now_reset() {
                host.send_clock_reset();
            }
        }

        let pulses = self.timings.midi_output_pulses;
        let pulse_ticks = self.target_ticks() / pulses;
        if self.current_ticks() >= self.midi_pulses_sent.saturating_mul(pulse_ticks)
            && self.midi_pulses_sent < pulses
        {
            host.send_clock_pulse();
            self.midi_pulses_sent += 1;
        }
    }

    /// Outputs are muted mid-tap and while the source is not running
    pub fn is_output_enabled(&self) -> bool {
        matches!(self.tap_state, TapState::Active | TapState::None) && self.state() == SourceState::Running
    }

    pub fn is_now_trigger(&self) -> bool {
        self.current_ticks() == 0 && self.is_output_enabled()
    }

    /// True for the one tick on which consumers should realign
    pub fn is_now_reset(&self) -> bool {
        self.active().is_now_reset() || self.now_reset
    }

    pub fn is_reaching_next_cycle(&self) -> bool {
        self.active().is_reaching_next_cycle()
    }

    /// Short pulse at the start of each cycle
    pub fn sync_output(&self) -> bool {
        self.sync_out_state && self.is_output_enabled()
    }

    /// 50% duty square wave at the cycle rate
    pub fn half_duty_output(&self) -> bool {
        self.half_duty_state && self.is_output_enabled()
    }

    pub fn current_ticks(&self) -> u32 {
        self.active().current_ticks()
    }

    pub fn target_ticks(&self) -> u32 {
        self.active().target_ticks()
    }

    /// Median of recent cycle lengths, hides the jitter of synced sources
    pub fn median_target_ticks(&self) -> u32 {
        if self.avg_target_ticks.is_empty() {
            self.target_ticks()
        } else {
            self.avg_target_ticks.median()
        }
    }

    pub fn average_target_ticks(&self) -> u32 {
        if self.avg_target_ticks.is_empty() {
            self.target_ticks()
        } else {
            self.avg_target_ticks.average()
        }
    }

    /// Position within the cycle, 0-100. Zero while the cycle length is unknown.
    pub fn percentage_state(&self) -> u32 {
        let target = self.target_ticks();
        if target == 0 {
            return 0;
        }
        (self.current_ticks() as u64 * 100 / target as u64) as u32
    }

    pub fn state(&self) -> SourceState {
        self.active().state()
    }

    pub fn sync_type(&self) -> Sync {
        self.sync_type
    }

    pub fn tap_state(&self) -> TapState {
        self.tap_state
    }

    pub fn pot_state(&self) -> PotState {
        self.pot_state
    }

    pub fn pending_reset(&self) -> Option<ResetCause> {
        self.pending_reset
    }

    /// Start the selected source on the beat
    pub fn start(&mut self) {
        debug!(source = ?self.sync_type, "clock start");
        self.active_mut().start();
    }

    pub fn stop(&mut self) {
        debug!(source = ?self.sync_type, "clock stop");
        self.active_mut().stop();
    }

    /// Continue without returning to the beat
    pub fn resume(&mut self) {
        debug!(source = ?self.sync_type, "clock resume");
        self.active_mut().resume();
    }

    /// Forward a tempo pot reading to the selected source.
    ///
    /// The first reading only latches; the pot then has to travel past the
    /// change threshold before it takes over from a tapped or restored tempo.
    pub fn set_pot(&mut self, pot_value: i32, host: &mut dyn ClockHost) {
        if self.pot_state == PotState::Undefined {
            self.prev_pot_value = pot_value;
            self.pot_state = PotState::RequiresThreshold;
        }
        if self.pot_state == PotState::RequiresThreshold
            && pot_value.abs_diff(self.prev_pot_value) < self.timings.pot_change_threshold.max(0) as u32
        {
            return;
        }
        if pot_value == self.prev_pot_value {
            return;
        }
        self.active_mut().set_pot(pot_value, host);
        self.prev_pot_value = pot_value;
        self.pot_state = PotState::Active;
    }

    /// Change the external clock ratio; false for values outside {1, 2, 4, 8}
    pub fn set_ext_divider_multiplier(&mut self, divider: u8, multiplier: u8, host: &mut dyn ClockHost) -> bool {
        self.external.set_ext_divider_multiplier(divider, multiplier, host)
    }

    pub fn set_sync_jack_plugged(&mut self, plugged: bool) {
        for sync in Sync::PRIORITY {
            self.source_mut(sync).set_sync_jack_plugged(plugged);
        }
    }

    pub fn clear_taps(&mut self) {
        self.tap_values.reset();
        self.tap_state = TapState::None;
    }

    /// Accept MIDI clock only from the first transport heard while MIDI
    /// is followed
    pub fn check_midi_source(&mut self, source: MidiSource) -> bool {
        match self.midi_source {
            Some(current) if current != source => false,
            _ => {
                self.midi_source = Some(source);
                true
            }
        }
    }

    /// Announce a reset at the next cycle boundary
    pub fn next_cycle_reset(&mut self) {
        self.pending_reset.get_or_insert(ResetCause::Requested);
    }

    pub fn save_to_memory(&self, storage: &mut dyn PersistentStorage) {
        for sync in Sync::PRIORITY {
            self.source(sync).save_to_memory(storage);
        }
    }

    pub fn load_from_memory(&mut self, storage: &dyn PersistentStorage) {
        for sync in Sync::PRIORITY {
            self.source_mut(sync).load_from_memory(storage);
        }
    }
}
