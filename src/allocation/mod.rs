//! Allocation Inverter
//!
//! Turns a trained model into hours per activity type. Each bin's weight is
//! read as score gained per second; bins with a small positive gain get
//! proportionally more time (`ideal = 1 / weight`). Anything that prevents
//! a model-based answer yields an even split instead, so callers always
//! receive a usable allocation.

use crate::matrix::row_sums;
use crate::rls::{ModelSnapshot, OnlineRls};
use crate::types::{Allocation, AllocationSource, SECONDS_PER_HOUR};

/// Split `budget_hours` across `snapshot`'s activity types, or evenly across
/// `fallback_types` when there is no usable model.
pub fn allocate(
    snapshot: Option<&ModelSnapshot>,
    budget_hours: f64,
    fallback_types: &[String],
) -> Allocation {
    let Some(snapshot) = snapshot else {
        tracing::debug!("no model, using even split");
        return even_split(budget_hours, fallback_types);
    };

    match model_allocation(snapshot, budget_hours) {
        Some(allocation) => allocation,
        None => even_split(budget_hours, fallback_types),
    }
}

fn model_allocation(snapshot: &ModelSnapshot, budget_hours: f64) -> Option<Allocation> {
    if !snapshot.is_consistent() {
        tracing::warn!(
            activity_count = snapshot.meta.activity_count,
            bins = snapshot.meta.bins,
            weights = snapshot.state.weights.len(),
            "model shape does not match metadata, ignoring it"
        );
        return None;
    }

    let estimator = match snapshot.restore() {
        Ok(estimator) => estimator,
        Err(err) => {
            tracing::warn!(error = %err, "model snapshot unusable, ignoring it");
            return None;
        }
    };

    let interpretable = estimator.interpretable_weights();
    let ideal = OnlineRls::ideal_time_weights(&interpretable);
    let total: f64 = ideal.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        tracing::info!("no bin has a positive benefit, using even split");
        return None;
    }

    let budget_secs = budget_hours * SECONDS_PER_HOUR;
    let scaled = OnlineRls::scaled_ideal_times(&ideal, budget_secs);
    let hours = row_sums(&scaled, snapshot.meta.bins)
        .into_iter()
        .map(|secs| secs / SECONDS_PER_HOUR)
        .collect();

    Some(Allocation {
        labels: snapshot.meta.activity_types.clone(),
        hours,
        source: AllocationSource::Model,
    })
}

/// `budget_hours / n` for each of `types`.
pub fn even_split(budget_hours: f64, types: &[String]) -> Allocation {
    let share = if types.is_empty() {
        0.0
    } else {
        budget_hours / types.len() as f64
    };
    Allocation {
        labels: types.to_vec(),
        hours: vec![share; types.len()],
        source: AllocationSource::EvenSplit,
    }
}
