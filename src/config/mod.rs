// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Clock configuration.
//!
//! All timing constants of the clock are expressed here in musical or
//! physical units (seconds, Hz, pot positions) and converted to ticks once,
//! when the clock is built. Files can be YAML or TOML; the extension picks
//! the parser.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Audio samples per second on the reference hardware
pub const HARDWARE_SAMPLE_RATE: f32 = 44_000.0;
/// Samples per audio block; the clock ticks once per block
pub const AUDIO_BLOCK_SIZE: usize = 48;
/// Default tick rate of the clock (one tick per audio block)
pub const AUDIO_LOOP_RATE: f32 = HARDWARE_SAMPLE_RATE / AUDIO_BLOCK_SIZE as f32;

/// Errors found while validating a configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("tap window is empty: min {min}s must be below max {max}s")]
    InvalidTapWindow { min: f32, max: f32 },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("tempo curve point {index} is invalid: {reason}")]
    InvalidTempoCurve { index: usize, reason: &'static str },

    #[error("MIDI channel must be 1-16, got {0}")]
    InvalidMidiChannel(u8),
}

/// One calibration point of the internal tempo pot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TempoPoint {
    /// Normalized pot position (0.0 - 1.0)
    pub pot: f32,
    /// Clock frequency at that position
    pub hz: f32,
}

/// Root clock configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClockConfig {
    /// Rate at which `Clock::process` is called
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f32,
    /// Width of the sync out pulse in ticks
    #[serde(default = "default_sync_out_ticks")]
    pub sync_out_ticks: u32,
    /// Taps closer together than this are treated as bounce
    #[serde(default = "default_tap_min_seconds")]
    pub tap_min_seconds: f32,
    /// Longest accepted interval between two taps
    #[serde(default = "default_tap_max_seconds")]
    pub tap_max_seconds: f32,
    /// A tap this soon after a cycle start does not restart the cycle
    #[serde(default = "default_tap_just_happened_seconds")]
    pub tap_just_happened_seconds: f32,
    /// The clock runs this many times faster than the tapping
    #[serde(default = "default_tap_tempo_multiplier")]
    pub tap_tempo_multiplier: u32,
    /// External clock silent for this long is considered stopped
    #[serde(default = "default_ext_probably_stopped_seconds")]
    pub ext_probably_stopped_seconds: f32,
    /// Pot travel (raw units) needed to unfreeze the tempo pot
    #[serde(default = "default_pot_change_threshold")]
    pub pot_change_threshold: i32,
    /// MIDI is lost when a gap exceeds this many times the previous gap
    #[serde(default = "default_midi_unavailable_multiplier")]
    pub midi_unavailable_multiplier: u32,
    /// ...and is longer than this many ticks
    #[serde(default = "default_midi_unavailable_floor_ticks")]
    pub midi_unavailable_floor_ticks: u32,
    /// MIDI clock pulses sent per clock cycle
    #[serde(default = "default_midi_output_pulses")]
    pub midi_output_pulses_per_cycle: u32,
    /// MIDI channel (1-16) used for controller messages
    #[serde(default = "default_midi_channel")]
    pub midi_channel: u8,
    /// Jack detection is exact (no patchbay), so unplugging drops the
    /// external source immediately
    #[serde(default)]
    pub reliable_jack_detect: bool,
    /// Internal tempo pot curve
    #[serde(default = "default_tempo_curve")]
    pub tempo_curve: [TempoPoint; 5],
}

fn default_sample_rate() -> f32 {
    AUDIO_LOOP_RATE
}
fn default_sync_out_ticks() -> u32 {
    5
}
fn default_tap_min_seconds() -> f32 {
    0.1
}
fn default_tap_max_seconds() -> f32 {
    2.0
}
fn default_tap_just_happened_seconds() -> f32 {
    0.2
}
fn default_tap_tempo_multiplier() -> u32 {
    4
}
fn default_ext_probably_stopped_seconds() -> f32 {
    2.0
}
fn default_pot_change_threshold() -> i32 {
    32
}
fn default_midi_unavailable_multiplier() -> u32 {
    4
}
fn default_midi_unavailable_floor_ticks() -> u32 {
    48
}
fn default_midi_output_pulses() -> u32 {
    6
}
fn default_midi_channel() -> u8 {
    1
}
fn default_tempo_curve() -> [TempoPoint; 5] {
    [
        TempoPoint { pot: 0.0, hz: 0.1 },
        TempoPoint { pot: 0.125, hz: 3.0 },
        TempoPoint { pot: 0.5, hz: 6.0 },
        TempoPoint { pot: 0.87, hz: 14.0 },
        TempoPoint { pot: 1.0, hz: 60.0 },
    ]
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            sync_out_ticks: default_sync_out_ticks(),
            tap_min_seconds: default_tap_min_seconds(),
            tap_max_seconds: default_tap_max_seconds(),
            tap_just_happened_seconds: default_tap_just_happened_seconds(),
            tap_tempo_multiplier: default_tap_tempo_multiplier(),
            ext_probably_stopped_seconds: default_ext_probably_stopped_seconds(),
            pot_change_threshold: default_pot_change_threshold(),
            midi_unavailable_multiplier: default_midi_unavailable_multiplier(),
            midi_unavailable_floor_ticks: default_midi_unavailable_floor_ticks(),
            midi_output_pulses_per_cycle: default_midi_output_pulses(),
            midi_channel: default_midi_channel(),
            reliable_jack_detect: false,
            tempo_curve: default_tempo_curve(),
        }
    }
}

impl ClockConfig {
    /// Defaults at a custom tick rate
    pub fn with_sample_rate(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    /// Load a configuration file (`.toml`, otherwise YAML) and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read clock config: {:?}", path))?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config = if is_toml {
            Self::from_toml(&contents)?
        } else {
            Self::from_yaml(&contents)?
        };
        config
            .validate()
            .with_context(|| format!("Invalid clock config: {:?}", path))?;
        Ok(config)
    }

    /// Parse a configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML clock config")
    }

    /// Parse a configuration from TOML
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML clock config")
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize clock config to YAML")
    }

    /// Check the values make a usable clock
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if !(self.tap_min_seconds < self.tap_max_seconds) {
            return Err(ConfigError::InvalidTapWindow {
                min: self.tap_min_seconds,
                max: self.tap_max_seconds,
            });
        }
        if self.tap_tempo_multiplier == 0 {
            return Err(ConfigError::ZeroValue("tap_tempo_multiplier"));
        }
        if self.midi_unavailable_multiplier == 0 {
            return Err(ConfigError::ZeroValue("midi_unavailable_multiplier"));
        }
        if self.midi_output_pulses_per_cycle == 0 {
            return Err(ConfigError::ZeroValue("midi_output_pulses_per_cycle"));
        }
        if !(self.ext_probably_stopped_seconds > 0.0) {
            return Err(ConfigError::ZeroValue("ext_probably_stopped_seconds"));
        }
        if !(1..=16).contains(&self.midi_channel) {
            return Err(ConfigError::InvalidMidiChannel(self.midi_channel));
        }

        for (index, point) in self.tempo_curve.iter().enumerate() {
            if !(point.hz > 0.0) {
                return Err(ConfigError::InvalidTempoCurve {
                    index,
                    reason: "frequency must be positive",
                });
            }
            if !(0.0..=1.0).contains(&point.pot) {
                return Err(ConfigError::InvalidTempoCurve {
                    index,
                    reason: "pot position must be within 0.0-1.0",
                });
            }
            if index > 0 && point.pot <= self.tempo_curve[index - 1].pot {
                return Err(ConfigError::InvalidTempoCurve {
                    index,
                    reason: "pot positions must be ascending",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = ClockConfig::from_yaml("sample_rate: 1000.0\n").unwrap();
        assert_eq!(config.sample_rate, 1000.0);
        assert_eq!(config.sync_out_ticks, 5);
        assert_eq!(config.tap_tempo_multiplier, 4);
        assert_eq!(config.pot_change_threshold, 32);
        assert_eq!(config.tempo_curve[2], TempoPoint { pot: 0.5, hz: 6.0 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
sample_rate: 1000
tap_max_seconds: 3.0
reliable_jack_detect: true
tempo_curve:
  - { pot: 0.0, hz: 1.0 }
  - { pot: 0.25, hz: 2.0 }
  - { pot: 0.5, hz: 4.0 }
  - { pot: 0.75, hz: 8.0 }
  - { pot: 1.0, hz: 16.0 }
"#;
        let config = ClockConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.tap_max_seconds, 3.0);
        assert!(config.reliable_jack_detect);
        assert_eq!(config.tempo_curve[4].hz, 16.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
sample_rate = 2000.0
midi_channel = 10
"#;
        let config = ClockConfig::from_toml(toml).unwrap();
        assert_eq!(config.sample_rate, 2000.0);
        assert_eq!(config.midi_channel, 10);
    }

    #[test]
    fn test_load_picks_parser_by_extension() {
        let dir = tempdir().unwrap();

        let toml_path = dir.path().join("clock.toml");
        fs::write(&toml_path, "sample_rate = 500.0\n").unwrap();
        assert_eq!(ClockConfig::load(&toml_path).unwrap().sample_rate, 500.0);

        let yaml_path = dir.path().join("clock.yaml");
        fs::write(&yaml_path, "sample_rate: 600.0\n").unwrap();
        assert_eq!(ClockConfig::load(&yaml_path).unwrap().sample_rate, 600.0);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clock.yaml");
        fs::write(&path, "sample_rate: 0.0\n").unwrap();
        assert!(ClockConfig::load(&path).is_err());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ClockConfig::default();
        config.tap_min_seconds = 3.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTapWindow { min: 3.0, max: 2.0 })
        );

        let mut config = ClockConfig::default();
        config.tap_tempo_multiplier = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroValue("tap_tempo_multiplier"))
        );

        let mut config = ClockConfig::default();
        config.tempo_curve[3].pot = 0.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTempoCurve { index: 3, .. })
        ));

        let mut config = ClockConfig::default();
        config.midi_channel = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMidiChannel(0)));
    }

    #[test]
    fn test_round_trip() {
        let original = ClockConfig::with_sample_rate(1234.0);
        let yaml = original.to_yaml().unwrap();
        let parsed = ClockConfig::from_yaml(&yaml).unwrap();
        assert_eq!(original, parsed);
    }
}
