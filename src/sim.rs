// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Offline stimulus for the clock.
//!
//! Generates jittery pulse trains standing in for a patch cable or a MIDI
//! clock, drives a [`Clock`] with them tick by tick, and reports what came
//! out. Used by the CLI and the benchmarks; nothing here runs in real time.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::midi::{messages, MidiCapture, MidiClockSender};
use crate::timing::{Clock, MidiTransport, SequencerLink, Sync};
use crate::util::{pot, POT_MIN};

/// Sync jack pulse width (ticks)
const SYNC_PULSE_WIDTH: u32 = 5;
/// Nominal external clock rate
const EXTERNAL_HZ: f64 = 4.0;
/// Nominal MIDI tempo
const MIDI_BPM: f64 = 120.0;
/// MIDI clock pulses per quarter note
const MIDI_PPQN: f64 = 24.0;
/// Share of the run after which a synced signal is pulled
const SIGNAL_LOSS_AT: f64 = 0.75;

/// Pulse train with optional timing jitter.
///
/// Edges sit on a fixed grid of `period` ticks; jitter moves each edge
/// independently, so it never accumulates into drift.
#[derive(Debug, Clone)]
pub struct PulseTrain {
    period: f64,
    jitter: f64,
    width: u32,
    nominal: f64,
    next_edge: f64,
    high_left: u32,
    tick: u64,
    enabled: bool,
    rng: StdRng,
}

impl PulseTrain {
    /// A train of one-tick pulses every `period_ticks`
    pub fn new(period_ticks: f64, seed: Option<u64>) -> Self {
        let period = period_ticks.max(1.0);
        Self {
            period,
            jitter: 0.0,
            width: 1,
            nominal: period,
            next_edge: period,
            high_left: 0,
            tick: 0,
            enabled: true,
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }

    /// Maximum edge displacement in ticks, either way
    pub fn with_jitter(mut self, jitter_ticks: f64) -> Self {
        self.jitter = jitter_ticks.clamp(0.0, self.period / 2.0);
        self
    }

    pub fn with_width(mut self, width_ticks: u32) -> Self {
        self.width = width_ticks.max(1);
        self
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pause or resume the train; resuming starts a fresh period
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.nominal = self.tick as f64 + self.period;
            self.next_edge = self.nominal;
        }
        self.enabled = enabled;
    }

    /// Level for the next tick
    pub fn next_level(&mut self) -> bool {
        self.tick += 1;
        if self.enabled && self.tick as f64 >= self.next_edge {
            self.nominal += self.period;
            let offset = if self.jitter > 0.0 {
                self.rng.gen_range(-self.jitter..=self.jitter)
            } else {
                0.0
            };
            self.next_edge = self.nominal + offset;
            self.high_left = self.width;
        }
        if self.high_left > 0 {
            self.high_left -= 1;
            true
        } else {
            false
        }
    }
}

/// Which reference the simulation plugs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Nothing patched; the pot is turned to the center
    Internal,
    /// 4 Hz pulses on the sync jack, pulled near the end
    External,
    /// 120 BPM MIDI clock, pulled near the end
    Midi,
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" | "int" => Ok(Scenario::Internal),
            "external" | "ext" | "sync" => Ok(Scenario::External),
            "midi" => Ok(Scenario::Midi),
            other => bail!("unknown scenario '{}' (expected internal, external or midi)", other),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Internal => write!(f, "internal"),
            Scenario::External => write!(f, "external"),
            Scenario::Midi => write!(f, "midi"),
        }
    }
}

/// Collaborator that captures MIDI output and sequencer realignments
pub struct SimHost {
    pub midi: MidiClockSender<MidiCapture>,
    pub realigns: Vec<u32>,
}

impl SimHost {
    pub fn new(midi_channel: u8) -> Self {
        Self {
            midi: MidiClockSender::new(MidiCapture::new(), midi_channel),
            realigns: Vec::new(),
        }
    }
}

impl MidiTransport for SimHost {
    fn send_clock_start(&mut self) {
        self.midi.send_clock_start();
    }

    fn send_clock_stop(&mut self) {
        self.midi.send_clock_stop();
    }

    fn send_clock_pulse(&mut self) {
        self.midi.send_clock_pulse();
    }

    fn report_disconnected(&mut self) {
        self.midi.report_disconnected();
    }
}

impl SequencerLink for SimHost {
    fn realign_to(&mut self, step: u32) {
        debug!(step, "sequencer realigned");
        self.realigns.push(step);
    }
}

/// A change of the followed source during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSwitch {
    pub tick: u64,
    pub to: Sync,
}

/// What a simulation run produced
#[derive(Debug, Clone)]
pub struct SimReport {
    pub scenario: Scenario,
    pub ticks: u64,
    pub sample_rate: f32,
    pub triggers: u64,
    pub resets: u64,
    pub switches: Vec<SourceSwitch>,
    pub realigns: Vec<u32>,
    pub midi_clock_out: usize,
    pub midi_transport_out: usize,
    pub final_sync: Sync,
    pub median_target_ticks: u32,
    /// Median cycle just before the synced signal was pulled
    pub synced_target_ticks: Option<u32>,
}

impl SimReport {
    /// Cycle rate of the last followed source
    pub fn cycle_hz(&self) -> f32 {
        if self.median_target_ticks == 0 {
            return 0.0;
        }
        self.sample_rate / self.median_target_ticks as f32
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario:        {}", self.scenario)?;
        writeln!(
            f,
            "Ticks:           {} ({:.1} s)",
            self.ticks,
            self.ticks as f32 / self.sample_rate
        )?;
        writeln!(f, "Triggers:        {}", self.triggers)?;
        writeln!(f, "Resets:          {}", self.resets)?;
        for switch in &self.switches {
            writeln!(
                f,
                "Source switch:   {:?} at {:.2} s",
                switch.to,
                switch.tick as f32 / self.sample_rate
            )?;
        }
        if let Some(ticks) = self.synced_target_ticks {
            writeln!(f, "Synced cycle:    {} ticks", ticks)?;
        }
        writeln!(f, "Final source:    {:?}", self.final_sync)?;
        writeln!(
            f,
            "Cycle:           {} ticks ({:.2} Hz)",
            self.median_target_ticks,
            self.cycle_hz()
        )?;
        writeln!(f, "MIDI clock out:  {}", self.midi_clock_out)?;
        write!(f, "MIDI start/stop: {}", self.midi_transport_out)
    }
}

/// Drive `clock` through `scenario` for `seconds` of ticks
pub fn simulate(
    clock: &mut Clock,
    host: &mut SimHost,
    scenario: Scenario,
    seconds: f32,
    seed: Option<u64>,
) -> SimReport {
    let sample_rate = clock.timings().sample_rate;
    let ticks = (seconds.max(0.0) * sample_rate) as u64;
    let loss_tick = (ticks as f64 * SIGNAL_LOSS_AT) as u64;
    let rate = sample_rate as f64;

    let mut sync_train = PulseTrain::new(rate / EXTERNAL_HZ, seed)
        .with_jitter(rate / EXTERNAL_HZ * 0.01)
        .with_width(SYNC_PULSE_WIDTH);
    let mut midi_train =
        PulseTrain::new(rate * 60.0 / (MIDI_BPM * MIDI_PPQN), seed.map(|s| s.wrapping_add(1)))
            .with_jitter(1.0);

    sync_train.set_enabled(scenario == Scenario::External);
    midi_train.set_enabled(scenario == Scenario::Midi);
    clock.set_sync_jack_plugged(scenario == Scenario::External);

    info!(%scenario, ticks, sample_rate, "simulation started");

    let mut triggers = 0;
    let mut resets = 0;
    let mut switches = Vec::new();
    let mut last_sync = clock.sync_type();
    let mut synced_target_ticks = None;
    // The pot sweeps to the center over the first half second
    let pot_sweep_ticks = (sample_rate * 0.5) as u64;
    let pot_center = pot(0.5);

    for tick in 1..=ticks {
        if tick == loss_tick && scenario != Scenario::Internal {
            info!(tick, "signal pulled");
            synced_target_ticks = Some(clock.median_target_ticks());
            sync_train.set_enabled(false);
            midi_train.set_enabled(false);
            clock.set_sync_jack_plugged(false);
        }
        if scenario == Scenario::Internal && tick <= pot_sweep_ticks {
            let value = POT_MIN as u64 + (pot_center - POT_MIN) as u64 * tick / pot_sweep_ticks.max(1);
            clock.set_pot(value as i32, host);
        }

        let sync = sync_train.next_level();
        let midi = midi_train.next_level();
        if clock.process(false, sync, midi, host) {
            triggers += 1;
        }
        if clock.is_now_reset() {
            resets += 1;
        }
        if clock.sync_type() != last_sync {
            last_sync = clock.sync_type();
            switches.push(SourceSwitch { tick, to: last_sync });
        }
    }

    let capture = host.midi.output();
    SimReport {
        scenario,
        ticks,
        sample_rate,
        triggers,
        resets,
        switches,
        realigns: host.realigns.clone(),
        midi_clock_out: capture.count(messages::TIMING_CLOCK),
        midi_transport_out: capture.count(messages::START) + capture.count(messages::STOP),
        final_sync: clock.sync_type(),
        median_target_ticks: clock.median_target_ticks(),
        synced_target_ticks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_train_spacing() {
        let mut train = PulseTrain::new(10.0, Some(1));
        let edges: Vec<u64> = (1..=50u64).filter(|_| train.next_level()).collect();
        assert_eq!(edges, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_pulse_width() {
        let mut train = PulseTrain::new(10.0, Some(1)).with_width(3);
        let levels: Vec<bool> = (0..14).map(|_| train.next_level()).collect();
        let high = levels.iter().filter(|&&l| l).count();
        assert_eq!(high, 3);
        assert!(levels[9] && levels[10] && levels[11]);
    }

    #[test]
    fn test_jitter_stays_on_grid() {
        let mut train = PulseTrain::new(100.0, Some(7)).with_jitter(3.0);
        let mut edges = Vec::new();
        let mut prev = false;
        for tick in 1..=10_050u64 {
            let level = train.next_level();
            if level && !prev {
                edges.push(tick);
            }
            prev = level;
        }
        assert_eq!(edges.len(), 100);
        for (i, &edge) in edges.iter().enumerate() {
            let nominal = (i as u64 + 1) * 100;
            assert!(edge.abs_diff(nominal) <= 4, "edge {} at {}", i, edge);
        }
    }

    #[test]
    fn test_disabled_train_is_silent() {
        let mut train = PulseTrain::new(5.0, Some(1));
        train.set_enabled(false);
        assert!((0..100).all(|_| !train.next_level()));
        train.set_enabled(true);
        assert!((0..5).any(|_| train.next_level()));
    }

    #[test]
    fn test_scenario_parse() {
        assert_eq!("MIDI".parse::<Scenario>().unwrap(), Scenario::Midi);
        assert_eq!("ext".parse::<Scenario>().unwrap(), Scenario::External);
        assert!("usb".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_internal_scenario() {
        let mut clock = Clock::new(1000.0);
        let mut host = SimHost::new(1);
        let report = simulate(&mut clock, &mut host, Scenario::Internal, 3.0, Some(1));
        assert_eq!(report.final_sync, Sync::Internal);
        assert!(report.switches.is_empty());
        assert_eq!(report.median_target_ticks, 166);
        assert!(report.triggers >= 15);
    }

    #[test]
    fn test_external_scenario_falls_back() {
        let mut clock = Clock::new(1000.0);
        let mut host = SimHost::new(1);
        let report = simulate(&mut clock, &mut host, Scenario::External, 8.0, Some(3));
        assert_eq!(report.switches.first().map(|s| s.to), Some(Sync::External));
        assert_eq!(report.final_sync, Sync::Internal);
        let synced = report.synced_target_ticks.unwrap_or(0);
        assert!((245..=255).contains(&synced), "synced cycle {}", synced);
        assert!(report.midi_clock_out > 0);
        assert!(report.midi_transport_out >= 2);
    }

    #[test]
    fn test_midi_scenario_follows_clock() {
        let mut clock = Clock::new(1000.0);
        let mut host = SimHost::new(1);
        let report = simulate(&mut clock, &mut host, Scenario::Midi, 2.0, Some(5));
        let path: Vec<Sync> = report.switches.iter().map(|s| s.to).collect();
        assert_eq!(path, vec![Sync::Midi, Sync::Internal]);
        // Six pulses at 20.8 ticks each
        let synced = report.synced_target_ticks.unwrap_or(0);
        assert!((120..=130).contains(&synced), "synced cycle {}", synced);
        // Disconnect went out as CC 121
        assert_eq!(host.midi.output().count(0xB0), 1);
    }
}
