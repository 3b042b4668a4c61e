// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

/// Azimuth drop in degrees that marks a new revolution by default.
pub const DEFAULT_REVOLUTION_THRESHOLD: f32 = 180.0;

/// Splits a measurement stream into revolutions.
///
/// A revolution ends when the azimuth decreases by more than the threshold.
/// Small decreases from interleaved banks or dual returns are ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevolutionDetector {
    threshold: f32,
    last: Option<f32>,
    revolutions: u64,
}

impl Default for RevolutionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_REVOLUTION_THRESHOLD)
    }
}

impl RevolutionDetector {
    /// Create a detector with the given threshold in degrees.
    pub fn new(threshold: f32) -> Self {
        RevolutionDetector {
            threshold,
            last: None,
            revolutions: 0,
        }
    }

    /// Feed the next azimuth in degrees. Returns true when it starts a new
    /// revolution.
    pub fn observe(&mut self, azimuth: f32) -> bool {
        let wrapped = match self.last {
            Some(last) => last - azimuth > self.threshold,
            None => false,
        };

        self.last = Some(azimuth);
        if wrapped {
            self.revolutions += 1;
        }
        wrapped
    }

    /// Number of completed revolutions.
    pub fn revolutions(&self) -> u64 {
        self.revolutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_detected() {
        let mut detector = RevolutionDetector::default();
        assert!(!detector.observe(350.0));
        assert!(!detector.observe(359.9));
        assert!(detector.observe(0.1));
        assert!(!detector.observe(0.2));
        assert_eq!(detector.revolutions(), 1);
    }

    #[test]
    fn small_decrease_ignored() {
        let mut detector = RevolutionDetector::new(90.0);
        assert!(!detector.observe(100.0));
        assert!(!detector.observe(99.5));
        assert!(!detector.observe(20.0));
        assert_eq!(detector.revolutions(), 0);
    }
}
