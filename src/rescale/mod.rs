//! Linear Rescaling Tracker
//!
//! Keeps a rolling window of (prediction, actual) pairs and fits
//! `actual ≈ slope · prediction + offset` by ordinary least squares, so raw
//! RLS coefficients can be read in score units.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{RESCALE_CAPACITY, RESCALE_MIN_PAIRS, RESCALE_SINGULAR_EPS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearRescaler {
    capacity: usize,
    #[serde(default = "default_min_pairs")]
    min_pairs: usize,
    /// Oldest first
    history: VecDeque<(f64, f64)>,
    slope: f64,
    offset: f64,
}

fn default_min_pairs() -> usize {
    RESCALE_MIN_PAIRS
}

impl LinearRescaler {
    pub fn new(capacity: usize, min_pairs: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            min_pairs,
            history: VecDeque::with_capacity(capacity.min(RESCALE_CAPACITY)),
            slope: 1.0,
            offset: 0.0,
        }
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.history.iter()
    }

    /// Record a pair and refit.
    pub fn observe(&mut self, prediction: f64, actual: f64) {
        self.history.push_back((prediction, actual));
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        self.refit();
    }

    pub fn apply(&self, prediction: f64) -> f64 {
        self.slope * prediction + self.offset
    }

    fn refit(&mut self) {
        if self.history.len() < self.min_pairs {
            self.reset_scale();
            return;
        }

        let n = self.history.len() as f64;
        let (sum_x, sum_y, sum_xx, sum_xy) = self.history.iter().fold(
            (0.0, 0.0, 0.0, 0.0),
            |(sx, sy, sxx, sxy), &(x, y)| (sx + x, sy + y, sxx + x * x, sxy + x * y),
        );

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.abs() < RESCALE_SINGULAR_EPS {
            // keep whatever scale we had
            return;
        }

        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let offset = (sum_y - slope * sum_x) / n;

        if slope.is_finite() && offset.is_finite() {
            self.slope = slope;
            self.offset = offset;
        } else {
            self.reset_scale();
        }
    }

    fn reset_scale(&mut self) {
        self.slope = 1.0;
        self.offset = 0.0;
    }

    /// Shape checks for a restored tracker.
    pub fn is_consistent(&self) -> bool {
        self.capacity > 0
            && self.history.len() <= self.capacity
            && self.slope.is_finite()
            && self.offset.is_finite()
    }
}

impl Default for LinearRescaler {
    fn default() -> Self {
        Self::new(RESCALE_CAPACITY, RESCALE_MIN_PAIRS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_until_enough_pairs() {
        let mut tracker = LinearRescaler::default();
        tracker.observe(1.0, 10.0);
        tracker.observe(2.0, 20.0);
        assert_eq!(tracker.slope(), 1.0);
        assert_eq!(tracker.offset(), 0.0);

        tracker.observe(3.0, 30.0);
        assert!((tracker.slope() - 10.0).abs() < 1e-9);
        assert!(tracker.offset().abs() < 1e-9);
    }

    #[test]
    fn fits_slope_and_offset() {
        let mut tracker = LinearRescaler::default();
        for x in [0.0, 1.0, 2.0, 3.0, 4.0] {
            tracker.observe(x, 2.0 * x + 5.0);
        }
        assert!((tracker.slope() - 2.0).abs() < 1e-9);
        assert!((tracker.offset() - 5.0).abs() < 1e-9);
        assert!((tracker.apply(10.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn singular_denominator_keeps_previous_scale() {
        let mut tracker = LinearRescaler::new(3, 3);
        for x in [1.0, 2.0, 3.0] {
            tracker.observe(x, 3.0 * x);
        }
        assert!((tracker.slope() - 3.0).abs() < 1e-9);

        // window now holds three identical predictions
        for _ in 0..3 {
            tracker.observe(5.0, 70.0);
        }
        assert!((tracker.slope() - 3.0).abs() < 1e-9);
        assert!(tracker.offset().abs() < 1e-9);
    }

    #[test]
    fn non_finite_fit_resets_to_identity() {
        let mut tracker = LinearRescaler::default();
        tracker.observe(1.0, 1.0);
        tracker.observe(2.0, 2.0);
        tracker.observe(3.0, f64::INFINITY);
        assert_eq!(tracker.slope(), 1.0);
        assert_eq!(tracker.offset(), 0.0);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut tracker = LinearRescaler::new(3, 3);
        for i in 0..5 {
            tracker.observe(i as f64, i as f64);
        }
        assert_eq!(tracker.len(), 3);
        let firsts: Vec<f64> = tracker.pairs().map(|p| p.0).collect();
        assert_eq!(firsts, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn serde_round_trip() {
        let mut tracker = LinearRescaler::default();
        for x in [0.5, 1.5, 2.5, 4.0] {
            tracker.observe(x, 10.0 * x - 1.0);
        }
        let json = serde_json::to_string(&tracker).unwrap();
        let restored: LinearRescaler = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, tracker);
        assert!(restored.is_consistent());
    }
}
