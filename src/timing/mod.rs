// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing and clock module.
//!
//! Three clock sources (internal oscillator, sync jack, MIDI clock) behind
//! one [`Clock`] that picks the best available reference every tick.

pub mod clock;
pub mod external;
pub mod internal;
pub mod midi_source;
pub mod params;
pub mod source;

pub use clock::{Clock, PotState, ResetCause, Sync, TapState};
pub use external::ExternalClockSource;
pub use internal::InternalClockSource;
pub use midi_source::MidiClockSource;
pub use params::{
    ClockTimings, DIVIDERS_MULTIPLIERS, MIDI_TEMPO_DIVIDERS, MIDI_TEMPO_DIVIDER_DEFAULT,
};
pub use source::{ClockHost, ClockSource, MidiTransport, NullHost, SequencerLink, SourceState};
