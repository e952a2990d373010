// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Running average and median over a fixed circular window.
//!
//! Storage is an inline array so the filter can live inside real-time
//! structures without touching the allocator.

/// Circular buffer of the last `N` tick values
#[derive(Debug, Clone, Copy)]
pub struct RunningAverage<const N: usize> {
    values: [u32; N],
    count: usize,
    index: usize,
    /// Start over when a new value is further than this from the average
    reset_threshold: Option<u32>,
}

impl<const N: usize> RunningAverage<N> {
    pub fn new() -> Self {
        assert!(N > 0, "RunningAverage needs a non-empty window");
        Self {
            values: [0; N],
            count: 0,
            index: 0,
            reset_threshold: None,
        }
    }

    /// Create a filter that discards its history on large jumps.
    ///
    /// A threshold of zero disables the behaviour. The clock's own windows
    /// run without one; this is for slower readers such as a tempo display
    /// that should snap to a new tempo instead of gliding.
    pub fn with_reset_threshold(threshold: u32) -> Self {
        let mut avg = Self::new();
        avg.set_reset_threshold(threshold);
        avg
    }

    pub fn set_reset_threshold(&mut self, threshold: u32) {
        self.reset_threshold = (threshold > 0).then_some(threshold);
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.index = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of stored values (saturates at the window size)
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn add(&mut self, value: u32) {
        if let Some(threshold) = self.reset_threshold {
            if !self.is_empty() && value.abs_diff(self.average()) > threshold {
                self.reset();
            }
        }
        self.values[self.index] = value;
        self.index = (self.index + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Mean of the stored values, 0 when empty
    pub fn average(&self) -> u32 {
        if self.count == 0 {
            return 0;
        }
        let sum: u64 = self.values[..self.count].iter().map(|&v| v as u64).sum();
        (sum / self.count as u64) as u32
    }

    /// Median of the stored values, 0 when empty.
    ///
    /// Even counts return the mean of the two middle values.
    pub fn median(&self) -> u32 {
        if self.count == 0 {
            return 0;
        }
        let mut sorted = self.values;
        let window = &mut sorted[..self.count];
        window.sort_unstable();

        let mid = self.count / 2;
        if self.count % 2 == 0 {
            ((window[mid - 1] as u64 + window[mid] as u64) / 2) as u32
        } else {
            window[mid]
        }
    }
}

impl<const N: usize> Default for RunningAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}
