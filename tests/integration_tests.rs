// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for the clock core
//!
//! These tests drive `Clock` through its public API together with the
//! MIDI, storage and config layers.

use std::fs;

use polyclock::config::ClockConfig;
use polyclock::midi::{messages, MidiClockRouter, MidiSource};
use polyclock::sim::{simulate, Scenario, SimHost};
use polyclock::storage::FileStorage;
use polyclock::timing::{Clock, NullHost, PotState, ResetCause, SourceState, Sync, TapState};
use polyclock::util::pot;

/// Internal clock with the pot moved to the center
fn centered_clock(sample_rate: f32) -> Clock {
    let mut clock = Clock::new(sample_rate);
    clock.set_pot(pot(0.0), &mut NullHost);
    clock.set_pot(pot(0.5), &mut NullHost);
    clock
}

fn idle(clock: &mut Clock, ticks: u32, host: &mut SimHost) {
    for _ in 0..ticks {
        clock.process(false, false, false, host);
    }
}

#[test]
fn test_internal_clock_at_six_hz() {
    let mut clock = centered_clock(1200.0);
    assert_eq!(clock.target_ticks(), 200);

    let mut triggers = 0;
    for _ in 0..6000 {
        if clock.process(false, false, false, &mut NullHost) {
            triggers += 1;
        }
    }
    assert_eq!(triggers, 30);
    assert_eq!(clock.median_target_ticks(), 200);
}

#[test]
fn test_source_priority() {
    let mut clock = Clock::new(1000.0);
    let mut host = SimHost::new(1);

    // Both references running: MIDI is followed
    for tick in 1..=200u32 {
        clock.process(false, tick % 50 == 0, tick % 10 == 0, &mut host);
    }
    assert_eq!(clock.sync_type(), Sync::Midi);

    // MIDI gone: the sync jack takes over
    for tick in 201..=300u32 {
        clock.process(false, tick % 50 == 0, false, &mut host);
    }
    assert_eq!(clock.sync_type(), Sync::External);

    // Sync gone too: back to the internal clock
    idle(&mut clock, 2001, &mut host);
    assert_eq!(clock.sync_type(), Sync::Internal);
    assert_eq!(clock.state(), SourceState::Running);
}

#[test]
fn test_midi_disconnect_goes_out_once() {
    let mut clock = Clock::new(1000.0);
    let mut host = SimHost::new(3);
    for tick in 1..=60u32 {
        clock.process(false, false, tick % 10 == 0, &mut host);
    }
    assert_eq!(clock.sync_type(), Sync::Midi);

    idle(&mut clock, 500, &mut host);
    assert_eq!(clock.sync_type(), Sync::Internal);

    let capture = host.midi.output();
    assert_eq!(capture.count(messages::CONTROL_CHANGE | 2), 1);
    assert!(capture.messages().contains(&vec![0xB2, 121, 0]));
}

#[test]
fn test_tap_tempo_round_trip() {
    let mut clock = centered_clock(1000.0);
    let mut host = SimHost::new(1);

    idle(&mut clock, 149, &mut host);
    clock.process(true, false, false, &mut host);
    clock.process(false, false, false, &mut host);
    assert_eq!(clock.tap_state(), TapState::WaitingForSecondTap);

    idle(&mut clock, 798, &mut host);
    clock.process(true, false, false, &mut host);
    clock.process(false, false, false, &mut host);

    // 800 ticks between taps, four clock cycles per tap
    assert_eq!(clock.tap_state(), TapState::Active);
    assert_eq!(clock.target_ticks(), 200);

    // The pot has to move past the threshold to take over again
    assert_eq!(clock.pot_state(), PotState::RequiresThreshold);
    clock.set_pot(pot(0.5) + 5, &mut host);
    assert_eq!(clock.target_ticks(), 200);
}

#[test]
fn test_tap_timeout_restores_outputs() {
    let mut clock = centered_clock(1000.0);
    let mut host = SimHost::new(1);

    idle(&mut clock, 149, &mut host);
    clock.process(true, false, false, &mut host);
    assert!(!clock.is_output_enabled());

    idle(&mut clock, 2001, &mut host);
    assert_eq!(clock.tap_state(), TapState::None);
    assert!(clock.is_output_enabled());
    assert_eq!(clock.target_ticks(), 166);
}

#[test]
fn test_requested_reset_lands_on_cycle_start() {
    let mut clock = centered_clock(1000.0);
    let mut host = SimHost::new(1);

    idle(&mut clock, 10, &mut host);
    clock.next_cycle_reset();
    assert_eq!(clock.pending_reset(), Some(ResetCause::Requested));

    let mut reset_at = None;
    for tick in 11..=400u32 {
        clock.process(false, false, false, &mut host);
        if clock.is_now_reset() {
            reset_at.get_or_insert(tick);
        }
    }
    assert_eq!(reset_at, Some(166));
    assert_eq!(clock.pending_reset(), None);

    // MIDI reset is a stop followed by a start
    let capture = host.midi.output();
    assert_eq!(capture.count(messages::STOP), 1);
    assert_eq!(capture.count(messages::START), 1);
}

#[test]
fn test_pot_repeat_is_idempotent() {
    let mut clock = centered_clock(1000.0);
    idle(&mut clock, 40, &mut SimHost::new(1));

    let before = (clock.target_ticks(), clock.current_ticks(), clock.pot_state());
    for _ in 0..10 {
        clock.set_pot(pot(0.5), &mut NullHost);
    }
    assert_eq!(before, (clock.target_ticks(), clock.current_ticks(), clock.pot_state()));
}

#[test]
fn test_router_feeds_midi_clock() {
    let mut clock = Clock::new(1000.0);
    let mut router = MidiClockRouter::new();

    for tick in 1..=120u32 {
        if tick % 10 == 0 {
            router.route_bytes(&mut clock, MidiSource::Usb, &[messages::TIMING_CLOCK]);
        }
        let pulse = router.take_pulse();
        clock.process(false, false, pulse, &mut NullHost);
    }
    assert_eq!(clock.sync_type(), Sync::Midi);
    assert_eq!(clock.target_ticks(), 60);

    // Another transport cannot stop the followed one
    router.route_bytes(&mut clock, MidiSource::Trs, &[messages::STOP]);
    assert_eq!(clock.state(), SourceState::Running);

    router.route_bytes(&mut clock, MidiSource::Usb, &[messages::STOP]);
    assert_eq!(clock.state(), SourceState::Stopped);
    assert!(!clock.is_output_enabled());
}

#[test]
fn test_settings_persist_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clock-state.yaml");

    let mut clock = centered_clock(1000.0);
    assert!(clock.set_ext_divider_multiplier(2, 1, &mut NullHost));

    let mut storage = FileStorage::open(&path).unwrap();
    clock.save_to_memory(&mut storage);
    storage.flush().unwrap();
    assert!(path.exists());

    let storage = FileStorage::open(&path).unwrap();
    let mut restored = Clock::new(1000.0);
    restored.load_from_memory(&storage);
    assert_eq!(restored.target_ticks(), 166);
    assert_eq!(restored.external().divider(), 2);
    assert_eq!(restored.external().multiplier(), 1);
    assert_eq!(restored.midi().divider(), 6);
}

#[test]
fn test_missing_state_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::open(dir.path().join("none.yaml")).unwrap();

    let mut clock = Clock::new(1000.0);
    clock.load_from_memory(&storage);
    assert_eq!(clock.external().divider(), 1);
    assert_eq!(clock.external().multiplier(), 1);
    assert_eq!(clock.midi().divider(), 6);
}

#[test]
fn test_config_files() {
    let dir = tempfile::tempdir().unwrap();

    let yaml_path = dir.path().join("clock.yaml");
    fs::write(&yaml_path, "sample_rate: 1200.0\nmidi_channel: 10\n").unwrap();
    let config = ClockConfig::load(&yaml_path).unwrap();
    assert_eq!(config.midi_channel, 10);
    assert_eq!(config.midi_output_pulses_per_cycle, 6);

    let toml_path = dir.path().join("clock.toml");
    fs::write(&toml_path, "sample_rate = 1200.0\nreliable_jack_detect = true\n").unwrap();
    let config = ClockConfig::load(&toml_path).unwrap();
    assert!(config.reliable_jack_detect);

    let mut clock = Clock::from_config(&config);
    assert_eq!(clock.timings().sample_rate, 1200.0);
    clock.set_pot(pot(0.0), &mut NullHost);
    clock.set_pot(pot(0.5), &mut NullHost);
    assert_eq!(clock.target_ticks(), 200);

    let bad_path = dir.path().join("bad.yaml");
    fs::write(&bad_path, "midi_channel: 0\n").unwrap();
    assert!(ClockConfig::load(&bad_path).is_err());
}

#[test]
fn test_simulated_internal_run() {
    let mut clock = Clock::new(1200.0);
    let mut host = SimHost::new(1);
    let report = simulate(&mut clock, &mut host, Scenario::Internal, 5.0, Some(42));

    assert_eq!(report.final_sync, Sync::Internal);
    assert_eq!(report.median_target_ticks, 200);
    assert!((report.cycle_hz() - 6.0).abs() < 0.01);
    assert!(report.switches.is_empty());
}
