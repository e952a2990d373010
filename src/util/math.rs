// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integer mapping helpers for potentiometer readings.

/// Lowest raw pot reading
pub const POT_MIN: i32 = 0;
/// Highest raw pot reading (12-bit ADC)
pub const POT_MAX: i32 = 4095;
/// Pot center
pub const POT_HALF: i32 = POT_MAX / 2;

/// Convert a normalized position (0.0 - 1.0) to a raw pot reading
pub fn pot(position: f32) -> i32 {
    (position.clamp(0.0, 1.0) * POT_MAX as f32 + 0.5) as i32
}

/// Linear integer re-mapping from one range to another (no clamping).
///
/// A degenerate input range returns `out_min`.
pub fn map(value: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    if in_max == in_min {
        return out_min;
    }
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Piecewise-linear curve through `N` calibration points.
///
/// Inputs must be ascending; outputs may go either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveMap<const N: usize> {
    pub input: [i32; N],
    pub output: [u32; N],
}

impl<const N: usize> CurveMap<N> {
    pub const fn new(input: [i32; N], output: [u32; N]) -> Self {
        Self { input, output }
    }

    /// Interpolate `value` along the curve, holding the end points outside
    /// the calibrated range
    pub fn map(&self, value: i32) -> u32 {
        if value <= self.input[0] {
            return self.output[0];
        }
        if value >= self.input[N - 1] {
            return self.output[N - 1];
        }
        for i in 0..N - 1 {
            let (lo, hi) = (self.input[i], self.input[i + 1]);
            if value >= lo && value <= hi {
                let mapped = map(
                    value as i64,
                    lo as i64,
                    hi as i64,
                    self.output[i] as i64,
                    self.output[i + 1] as i64,
                );
                return mapped.clamp(0, u32::MAX as i64) as u32;
            }
        }
        self.output[N - 1]
    }
}
