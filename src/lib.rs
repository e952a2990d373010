// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Clock core for a Eurorack sequencer.
//!
//! A [`timing::Clock`] is ticked once per audio block and follows the best
//! available source: MIDI clock, then the sync input jack, then its own
//! pot/tap driven tempo. It produces trigger and reset events for the
//! sequencer, sync out pulses, and MIDI clock out.

pub mod config;
pub mod midi;
pub mod sim;
pub mod storage;
pub mod timing;
pub mod util;

pub use config::ClockConfig;
pub use timing::{Clock, ClockSource, SourceState, Sync};
