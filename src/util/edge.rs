// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Edge detection for boolean signals (buttons, trigger inputs).

/// Which transition the detector reports.
///
/// The clock only listens for rising edges; falling detection is part of
/// the general purpose helper for gate-release inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeType {
    /// false -> true
    Rising,
    /// true -> false
    Falling,
}

/// Reports a single `true` on the sample where the watched transition happens.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetector {
    edge: EdgeType,
    prev: bool,
}

impl EdgeDetector {
    pub fn new(edge: EdgeType) -> Self {
        Self {
            edge,
            // A falling detector starts "high", so a low input at power-up counts as a falling edge
            prev: edge == EdgeType::Falling,
        }
    }

    pub fn rising() -> Self {
        Self::new(EdgeType::Rising)
    }

    /// Feed the next sample; true if the configured edge just occurred
    pub fn process(&mut self, value: bool) -> bool {
        let detected = match self.edge {
            EdgeType::Rising => value && !self.prev,
            EdgeType::Falling => !value && self.prev,
        };
        self.prev = value;
        detected
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::rising()
    }
}
