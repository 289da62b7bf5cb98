//! Recursive Least Squares Estimator
//!
//! Online linear regression of quiz score on a flattened study-time grid,
//! with exponential forgetting and a rolling rescaling fit.
//!
//! Update for a feature vector `x` and score `y`:
//! - `Px = P·x`, `denom = λ + xᵀ·Px`, `k = Px / denom`
//! - `ŷ = w·x`, `w ← w + k·(y − ŷ)`
//! - `P ← (P − k·Pxᵀ) / λ`
//! - the pair `(ŷ, y)` feeds the [`LinearRescaler`]
//!
//! Replays are order dependent when λ < 1: later examples weigh more.

use serde::{Deserialize, Serialize};

use crate::error::RlsError;
use crate::matrix::{
    dot_product, mat_vec_mul, rank1_downdate_scaled, scaled_identity, vec_add_scaled, vec_scaled,
};
use crate::rescale::LinearRescaler;
use crate::sanitize::{diagnose_estimator, has_invalid_values, recondition_covariance};
use crate::types::{DiagnosticResult, ModelMetadata, DEFAULT_PRIOR_DELTA, EPSILON};

/// 在线 RLS 估计器
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineRls {
    /// 特征维度 d = S·B
    dimension: usize,
    /// 遗忘因子 λ
    forgetting: f64,
    /// 初始协方差尺度 δ
    prior_delta: f64,
    /// 权重向量 w (d)
    weights: Vec<f64>,
    /// 协方差矩阵 P (d×d, 行优先)
    covariance: Vec<f64>,
    rescaler: LinearRescaler,
    update_count: u32,
}

impl OnlineRls {
    /// Fresh estimator: `w = 0`, `P = δ·I`.
    pub fn new(dimension: usize, forgetting: f64, prior_delta: f64) -> Self {
        Self::with_rescaler(dimension, forgetting, prior_delta, LinearRescaler::default())
    }

    pub fn with_rescaler(
        dimension: usize,
        forgetting: f64,
        prior_delta: f64,
        rescaler: LinearRescaler,
    ) -> Self {
        Self {
            dimension,
            forgetting,
            prior_delta,
            weights: vec![0.0; dimension],
            covariance: scaled_identity(dimension, prior_delta),
            rescaler,
            update_count: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn forgetting(&self) -> f64 {
        self.forgetting
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn covariance(&self) -> &[f64] {
        &self.covariance
    }

    pub fn rescaler(&self) -> &LinearRescaler {
        &self.rescaler
    }

    pub fn update_count(&self) -> u32 {
        self.update_count
    }

    /// Raw prediction `w·x`.
    pub fn predict(&self, x: &[f64]) -> Result<f64, RlsError> {
        self.check_input(x)?;
        Ok(dot_product(&self.weights, x))
    }

    /// Fold one example into the state and return the pre-update prediction.
    ///
    /// Rejected inputs leave the state untouched.
    pub fn update(&mut self, x: &[f64], y: f64) -> Result<f64, RlsError> {
        self.check_input(x)?;
        if !y.is_finite() {
            return Err(RlsError::NonFiniteInput);
        }

        let d = self.dimension;
        let px = mat_vec_mul(&self.covariance, x, d);
        let denom = self.forgetting + dot_product(x, &px);
        if !denom.is_finite() || denom.abs() < EPSILON {
            return Err(RlsError::DegenerateDenominator(denom));
        }

        let gain = vec_scaled(&px, 1.0 / denom);
        let prediction = dot_product(&self.weights, x);
        let error = y - prediction;

        vec_add_scaled(&mut self.weights, &gain, error);
        rank1_downdate_scaled(&mut self.covariance, &gain, &px, d, self.forgetting);

        self.rescaler.observe(prediction, y);
        self.update_count = self.update_count.saturating_add(1);

        Ok(prediction)
    }

    fn check_input(&self, x: &[f64]) -> Result<(), RlsError> {
        if x.len() != self.dimension {
            return Err(RlsError::DimensionMismatch {
                expected: self.dimension,
                actual: x.len(),
            });
        }
        if has_invalid_values(x) {
            return Err(RlsError::NonFiniteInput);
        }
        Ok(())
    }

    /// `a·w`, the weights expressed in score units per second.
    pub fn interpretable_weights(&self) -> Vec<f64> {
        vec_scaled(&self.weights, self.rescaler.slope())
    }

    /// Reciprocal of every positive weight, zero elsewhere.
    pub fn ideal_time_weights(interpretable: &[f64]) -> Vec<f64> {
        interpretable
            .iter()
            .map(|&v| if v > 0.0 && v.is_finite() { 1.0 / v } else { 0.0 })
            .collect()
    }

    /// Ideal weights rescaled to sum to `total_secs`.
    ///
    /// All zeros when no weight is positive; callers fall back on that.
    pub fn scaled_ideal_times(ideal: &[f64], total_secs: f64) -> Vec<f64> {
        let sum: f64 = ideal.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return vec![0.0; ideal.len()];
        }
        vec_scaled(ideal, total_secs / sum)
    }

    pub fn diagnose(&self) -> DiagnosticResult {
        diagnose_estimator(&self.weights, &self.covariance, self.dimension)
    }

    /// Repair P in place, falling back to the prior scale on the diagonal.
    pub fn recondition(&mut self) {
        recondition_covariance(&mut self.covariance, self.dimension, self.prior_delta);
    }

    pub fn to_state(&self) -> RlsState {
        RlsState {
            dimension: self.dimension,
            forgetting: self.forgetting,
            prior_delta: self.prior_delta,
            weights: self.weights.clone(),
            covariance: self.covariance.clone(),
            rescaler: self.rescaler.clone(),
            update_count: self.update_count,
        }
    }

    /// Restore from a persisted state, rejecting inconsistent shapes.
    pub fn from_state(state: RlsState) -> Result<Self, RlsError> {
        let d = state.dimension;
        if state.weights.len() != d {
            return Err(RlsError::Corrupted(format!(
                "weight length {} does not match dimension {}",
                state.weights.len(),
                d
            )));
        }
        if state.covariance.len() != d * d {
            return Err(RlsError::Corrupted(format!(
                "covariance length {} does not match {}x{}",
                state.covariance.len(),
                d,
                d
            )));
        }
        if !(state.forgetting > 0.0 && state.forgetting <= 1.0) {
            return Err(RlsError::Corrupted(format!(
                "forgetting factor {}",
                state.forgetting
            )));
        }
        if has_invalid_values(&state.weights) || has_invalid_values(&state.covariance) {
            return Err(RlsError::Corrupted("non-finite weights or covariance".into()));
        }
        if !state.rescaler.is_consistent() {
            return Err(RlsError::Corrupted("rescaling tracker".into()));
        }

        Ok(Self {
            dimension: d,
            forgetting: state.forgetting,
            prior_delta: state.prior_delta,
            weights: state.weights,
            covariance: state.covariance,
            rescaler: state.rescaler,
            update_count: state.update_count,
        })
    }
}

fn default_prior_delta() -> f64 {
    DEFAULT_PRIOR_DELTA
}

/// Serializable estimator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RlsState {
    pub dimension: usize,
    pub forgetting: f64,
    #[serde(default = "default_prior_delta")]
    pub prior_delta: f64,
    pub weights: Vec<f64>,
    pub covariance: Vec<f64>,
    #[serde(default)]
    pub rescaler: LinearRescaler,
    #[serde(default)]
    pub update_count: u32,
}

/// What gets persisted per course: estimator state plus its grid shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    #[serde(flatten)]
    pub state: RlsState,
    pub meta: ModelMetadata,
}

impl ModelSnapshot {
    pub fn new(estimator: &OnlineRls, meta: ModelMetadata) -> Self {
        Self {
            state: estimator.to_state(),
            meta,
        }
    }

    /// Metadata agrees with the stored weight vector.
    pub fn is_consistent(&self) -> bool {
        self.meta.matches(self.state.weights.len())
    }

    pub fn restore(&self) -> Result<OnlineRls, RlsError> {
        OnlineRls::from_state(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(i: usize) -> Vec<f64> {
        vec![(i % 7) as f64 + 1.0, (i % 3) as f64, ((i * 5) % 11) as f64]
    }

    #[test]
    fn fresh_state_is_prior() {
        let rls = OnlineRls::new(2, 0.99, 1e5);
        assert_eq!(rls.weights(), &[0.0, 0.0]);
        assert_eq!(rls.covariance(), &[1e5, 0.0, 0.0, 1e5]);
        assert_eq!(rls.update_count(), 0);
    }

    #[test]
    fn converges_on_noiseless_linear_target() {
        let truth = [2.0, -1.0, 0.5];
        let mut rls = OnlineRls::new(3, 1.0, 1e5);
        for i in 0..60 {
            let x = feature(i);
            let y = dot_product(&truth, &x);
            rls.update(&x, y).unwrap();
        }
        for (w, t) in rls.weights().iter().zip(truth.iter()) {
            assert!((w - t).abs() < 1e-3, "weight {w} vs {t}");
        }
        let x = feature(100);
        assert!((rls.predict(&x).unwrap() - dot_product(&truth, &x)).abs() < 1e-2);
    }

    #[test]
    fn replay_is_order_dependent_with_forgetting() {
        let mut forward = OnlineRls::new(1, 0.9, 1e5);
        forward.update(&[1.0], 1.0).unwrap();
        forward.update(&[1.0], 3.0).unwrap();

        let mut backward = OnlineRls::new(1, 0.9, 1e5);
        backward.update(&[1.0], 3.0).unwrap();
        backward.update(&[1.0], 1.0).unwrap();

        // the most recent score dominates
        assert!(forward.weights()[0] > 2.0);
        assert!(backward.weights()[0] < 2.0);
    }

    #[test]
    fn update_returns_prior_prediction() {
        let mut rls = OnlineRls::new(1, 1.0, 1e5);
        assert_eq!(rls.update(&[2.0], 10.0).unwrap(), 0.0);
        let second = rls.update(&[2.0], 10.0).unwrap();
        assert!((second - 10.0).abs() < 1e-3);
    }

    #[test]
    fn zero_feature_vector_only_inflates_covariance() {
        let mut rls = OnlineRls::new(2, 0.5, 1.0);
        rls.update(&[0.0, 0.0], 42.0).unwrap();
        assert_eq!(rls.weights(), &[0.0, 0.0]);
        assert_eq!(rls.covariance(), &[2.0, 0.0, 0.0, 2.0]);
        assert_eq!(rls.rescaler().len(), 1);
    }

    #[test]
    fn rejects_bad_inputs_without_mutation() {
        let mut rls = OnlineRls::new(2, 0.99, 1e5);
        let before = rls.clone();

        assert!(matches!(
            rls.update(&[1.0], 1.0),
            Err(RlsError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            rls.update(&[f64::NAN, 1.0], 1.0),
            Err(RlsError::NonFiniteInput)
        ));
        assert!(matches!(
            rls.update(&[1.0, 1.0], f64::INFINITY),
            Err(RlsError::NonFiniteInput)
        ));
        assert_eq!(rls, before);
    }

    #[test]
    fn ideal_times_invert_positive_weights() {
        let ideal = OnlineRls::ideal_time_weights(&[0.5, -1.0, 0.0, 0.25]);
        assert_eq!(ideal, vec![2.0, 0.0, 0.0, 4.0]);

        let scaled = OnlineRls::scaled_ideal_times(&ideal, 600.0);
        assert_eq!(scaled, vec![200.0, 0.0, 0.0, 400.0]);

        let nothing = OnlineRls::scaled_ideal_times(&[0.0, 0.0], 600.0);
        assert_eq!(nothing, vec![0.0, 0.0]);
    }

    #[test]
    fn interpretable_weights_apply_rescale_slope() {
        let mut rls = OnlineRls::new(1, 1.0, 1e5);
        for x in [1.0, 2.0, 3.0, 4.0] {
            rls.update(&[x], 2.0 * x).unwrap();
        }
        let slope = rls.rescaler().slope();
        assert_eq!(rls.interpretable_weights(), vec![rls.weights()[0] * slope]);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut rls = OnlineRls::new(3, 0.99, 1e5);
        for i in 0..10 {
            rls.update(&feature(i), i as f64 * 3.0).unwrap();
        }
        let meta = ModelMetadata::new(vec!["A".into(), "B".into(), "C".into()], 1);
        let snapshot = ModelSnapshot::new(&rls, meta);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"meta\""));
        assert!(json.contains("\"updateCount\""));

        let restored: ModelSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
        assert!(restored.is_consistent());
        assert_eq!(restored.restore().unwrap(), rls);
    }

    #[test]
    fn from_state_rejects_bad_shapes() {
        let mut state = OnlineRls::new(2, 0.99, 1e5).to_state();
        state.covariance.pop();
        assert!(matches!(
            OnlineRls::from_state(state),
            Err(RlsError::Corrupted(_))
        ));

        let mut state = OnlineRls::new(2, 0.99, 1e5).to_state();
        state.weights[0] = f64::NAN;
        assert!(OnlineRls::from_state(state).is_err());

        let mut state = OnlineRls::new(2, 0.99, 1e5).to_state();
        state.forgetting = 0.0;
        assert!(OnlineRls::from_state(state).is_err());
    }

    #[test]
    fn recondition_keeps_healthy_state_symmetric() {
        let mut rls = OnlineRls::new(3, 0.99, 1e5);
        for i in 0..20 {
            rls.update(&feature(i), i as f64).unwrap();
        }
        rls.recondition();
        let p = rls.covariance();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(p[i * 3 + j], p[j * 3 + i]);
            }
        }
        assert!(!rls.diagnose().has_nan);
    }
}
