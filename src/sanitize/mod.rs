//! Data Sanitization
//!
//! Numerical stability utilities for the RLS state.
//!
//! Functions:
//! - Input validation
//! - Covariance reconditioning
//! - Model health diagnostics

use crate::types::{DiagnosticResult, EPSILON, MAX_CONDITION_ESTIMATE};

/// 是否包含 NaN 或 Inf
pub fn has_invalid_values(values: &[f64]) -> bool {
    values.iter().any(|v| !v.is_finite())
}

/// Repair P in place: replace NaN/Inf, keep the diagonal positive, restore
/// symmetry. `fallback_diag` replaces unusable diagonal entries.
pub fn recondition_covariance(p: &mut [f64], d: usize, fallback_diag: f64) {
    let safe_diag = if fallback_diag.is_finite() && fallback_diag > EPSILON {
        fallback_diag
    } else {
        1.0
    };

    for i in 0..d {
        for j in 0..d {
            let idx = i * d + j;
            if !p[idx].is_finite() {
                p[idx] = if i == j { safe_diag } else { 0.0 };
            }
        }

        let diag_idx = i * d + i;
        if p[diag_idx] < EPSILON {
            p[diag_idx] = EPSILON;
        }
    }

    // 确保对称性
    for i in 0..d {
        for j in (i + 1)..d {
            let avg = (p[i * d + j] + p[j * d + i]) / 2.0;
            p[i * d + j] = avg;
            p[j * d + i] = avg;
        }
    }
}

/// Periodic reconditioning: every `interval` updates, never when unset.
pub fn needs_recondition(update_count: u32, interval: Option<u32>) -> bool {
    match interval {
        Some(n) if n > 0 => update_count > 0 && update_count % n == 0,
        _ => false,
    }
}

/// Health report for an estimator with weights `w` and d×d covariance `p`.
///
/// The condition estimate is the ratio of the largest to the smallest
/// positive finite diagonal entry of P.
pub fn diagnose_estimator(w: &[f64], p: &[f64], d: usize) -> DiagnosticResult {
    let has_nan = w.iter().chain(p).any(|v| v.is_nan());
    let has_inf = w.iter().chain(p).any(|v| v.is_infinite());

    let (min_diagonal, max_diagonal) = (0..d)
        .map(|i| p[i * d + i])
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold(None, |range: Option<(f64, f64)>, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 0.0));

    let condition_number = if d == 0 {
        1.0
    } else if min_diagonal > EPSILON {
        max_diagonal / min_diagonal
    } else {
        f64::MAX
    };

    let is_healthy = !has_nan && !has_inf && condition_number < MAX_CONDITION_ESTIMATE;
    let message = match (has_nan, has_inf) {
        (true, _) => "Model contains NaN values".to_string(),
        (false, true) => "Model contains infinite values".to_string(),
        _ if !is_healthy => format!("Model has high condition number: {condition_number:.2e}"),
        _ => "Model is healthy".to_string(),
    };

    DiagnosticResult {
        is_healthy,
        has_nan,
        has_inf,
        condition_number,
        min_diagonal,
        max_diagonal,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_invalid_values() {
        assert!(!has_invalid_values(&[1.0, 2.0, 3.0]));
        assert!(!has_invalid_values(&[]));
        assert!(has_invalid_values(&[1.0, f64::NAN, 3.0]));
        assert!(has_invalid_values(&[f64::NEG_INFINITY, 2.0]));
    }

    #[test]
    fn test_recondition_repairs_invalid_entries() {
        let d = 2;
        let mut p = vec![f64::NAN, 1.0, 3.0, -2.0];
        recondition_covariance(&mut p, d, 5.0);
        assert_eq!(p[0], 5.0);
        assert_eq!(p[1], 2.0);
        assert_eq!(p[2], 2.0);
        assert_eq!(p[3], EPSILON);
    }

    #[test]
    fn test_needs_recondition() {
        assert!(!needs_recondition(100, None));
        assert!(!needs_recondition(0, Some(10)));
        assert!(!needs_recondition(7, Some(10)));
        assert!(needs_recondition(20, Some(10)));
        assert!(!needs_recondition(20, Some(0)));
    }

    #[test]
    fn test_diagnose_healthy_identity() {
        let p = vec![1.0, 0.0, 0.0, 1.0];
        let result = diagnose_estimator(&[0.0, 0.0], &p, 2);
        assert!(result.is_healthy);
        assert_eq!(result.condition_number, 1.0);
        assert_eq!(result.message, "Model is healthy");
    }

    #[test]
    fn test_diagnose_nan_weights() {
        let p = vec![1.0, 0.0, 0.0, 1.0];
        let result = diagnose_estimator(&[f64::NAN, 0.0], &p, 2);
        assert!(!result.is_healthy);
        assert!(result.has_nan);
        assert_eq!(result.message, "Model contains NaN values");
    }

    #[test]
    fn test_diagnose_infinite_covariance() {
        let p = vec![f64::INFINITY, 0.0, 0.0, 1.0];
        let result = diagnose_estimator(&[0.0, 0.0], &p, 2);
        assert!(!result.is_healthy);
        assert!(result.has_inf);
    }

    #[test]
    fn test_diagnose_high_condition_number() {
        let p = vec![1e-6, 0.0, 0.0, 1e10];
        let result = diagnose_estimator(&[0.0, 0.0], &p, 2);
        assert!(!result.is_healthy);
        assert!(result.message.contains("condition number"));
        assert_eq!(result.min_diagonal, 1e-6);
        assert_eq!(result.max_diagonal, 1e10);
    }
}
