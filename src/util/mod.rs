// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Small allocation-free helpers used by the clock core.

pub mod average;
pub mod edge;
pub mod math;

pub use average::RunningAverage;
pub use edge::{EdgeDetector, EdgeType};
pub use math::{map, pot, CurveMap, POT_HALF, POT_MAX, POT_MIN};
