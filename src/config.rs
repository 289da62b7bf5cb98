//! Advisor configuration, read from `STUDY_*` environment variables.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::features::{BinLayout, NightWindow};
use crate::types::{
    DEFAULT_ACTIVITY_TYPES, DEFAULT_BINS, DEFAULT_FORGETTING, DEFAULT_PRIOR_DELTA,
    DEFAULT_WINDOW_DAYS, RESCALE_CAPACITY, RESCALE_MIN_PAIRS,
};

/// Tunables for feature construction, the estimator and the allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub window_days: u32,
    /// Start of the daily excluded interval, `HH:MM`
    pub night_start: String,
    /// End of the daily excluded interval, `HH:MM`
    pub night_end: String,
    pub bins: usize,
    pub forgetting: f64,
    pub prior_delta: f64,
    /// Future sessions tolerated before the scan stops; `None` filters the
    /// whole history by range instead.
    pub future_tolerance: Option<usize>,
    pub rescale_capacity: usize,
    pub rescale_min_pairs: usize,
    /// Hour of the quiz day used as the feature target time
    pub quiz_hour: u32,
    pub default_budget_hours: f64,
    /// Recondition P every N updates during a retrain
    pub recondition_interval: Option<u32>,
    pub fallback_activity_types: Vec<String>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            night_start: "21:00".to_string(),
            night_end: "06:00".to_string(),
            bins: DEFAULT_BINS,
            forgetting: DEFAULT_FORGETTING,
            prior_delta: DEFAULT_PRIOR_DELTA,
            future_tolerance: Some(1),
            rescale_capacity: RESCALE_CAPACITY,
            rescale_min_pairs: RESCALE_MIN_PAIRS,
            quiz_hour: 12,
            default_budget_hours: 10.0,
            recondition_interval: None,
            fallback_activity_types: DEFAULT_ACTIVITY_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_optional<T: FromStr>(key: &str, default: Option<T>) -> Option<T> {
    match std::env::var(key) {
        Ok(value) => {
            let value = value.trim();
            if value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("off") {
                None
            } else {
                value.parse::<T>().ok().or(default)
            }
        }
        Err(_) => default,
    }
}

impl AdvisorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fallback_activity_types = std::env::var("STUDY_DEFAULT_TYPES")
            .ok()
            .map(|value| {
                value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|types| !types.is_empty())
            .unwrap_or(defaults.fallback_activity_types);

        Self {
            window_days: env_or("STUDY_WINDOW_DAYS", defaults.window_days),
            night_start: std::env::var("STUDY_NIGHT_START").unwrap_or(defaults.night_start),
            night_end: std::env::var("STUDY_NIGHT_END").unwrap_or(defaults.night_end),
            bins: env_or("STUDY_BINS", defaults.bins),
            forgetting: env_or("STUDY_FORGETTING", defaults.forgetting),
            prior_delta: env_or("STUDY_PRIOR_DELTA", defaults.prior_delta),
            future_tolerance: env_optional("STUDY_FUTURE_TOLERANCE", defaults.future_tolerance),
            rescale_capacity: env_or("STUDY_RESCALE_CAPACITY", defaults.rescale_capacity),
            rescale_min_pairs: env_or("STUDY_RESCALE_MIN_PAIRS", defaults.rescale_min_pairs),
            quiz_hour: env_or("STUDY_QUIZ_HOUR", defaults.quiz_hour),
            default_budget_hours: env_or("STUDY_BUDGET_HOURS", defaults.default_budget_hours),
            recondition_interval: env_optional(
                "STUDY_RECONDITION_INTERVAL",
                defaults.recondition_interval,
            ),
            fallback_activity_types,
        }
    }

    /// Reject inconsistent settings before any computation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.feature_layout()?;

        if !(self.forgetting > 0.0 && self.forgetting <= 1.0) {
            return Err(ConfigError::InvalidForgetting(self.forgetting));
        }
        if !(self.prior_delta.is_finite() && self.prior_delta > 0.0) {
            return Err(ConfigError::InvalidPrior(self.prior_delta));
        }
        if self.rescale_capacity == 0 {
            return Err(ConfigError::ZeroRescaleCapacity);
        }
        if self.quiz_hour >= 24 {
            return Err(ConfigError::InvalidQuizHour(self.quiz_hour));
        }
        if self.fallback_activity_types.is_empty() {
            return Err(ConfigError::NoActivityTypes);
        }
        Ok(())
    }

    pub fn night_window(&self) -> Result<NightWindow, ConfigError> {
        NightWindow::parse(&self.night_start, &self.night_end)
    }

    pub fn feature_layout(&self) -> Result<BinLayout, ConfigError> {
        BinLayout::new(self.window_days, self.bins, self.night_window()?)
    }

    /// Feature target time for a quiz taken on `date`.
    pub fn target_time(&self, date: NaiveDate) -> NaiveDateTime {
        let time = NaiveTime::from_hms_opt(self.quiz_hour.min(23), 0, 0).unwrap_or_default();
        date.and_time(time)
    }

    /// Budget actually used for an allocation request.
    pub fn effective_budget(&self, requested_hours: f64) -> f64 {
        if requested_hours.is_finite() && requested_hours > 0.0 {
            requested_hours
        } else {
            tracing::warn!(
                requested_hours,
                default = self.default_budget_hours,
                "invalid budget, using default"
            );
            self.default_budget_hours
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AdvisorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bins, 50);
        assert_eq!(config.window_days, 10);
        assert_eq!(config.future_tolerance, Some(1));
    }

    #[test]
    fn rejects_full_day_night() {
        let config = AdvisorConfig {
            night_start: "06:00".into(),
            night_end: "06:00".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NightCoversDay { .. })
        ));
    }

    #[test]
    fn rejects_bad_numbers() {
        let zero_bins = AdvisorConfig {
            bins: 0,
            ..Default::default()
        };
        assert!(matches!(zero_bins.validate(), Err(ConfigError::ZeroBins)));

        let zero_window = AdvisorConfig {
            window_days: 0,
            ..Default::default()
        };
        assert!(matches!(zero_window.validate(), Err(ConfigError::ZeroWindow)));

        let bad_lambda = AdvisorConfig {
            forgetting: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            bad_lambda.validate(),
            Err(ConfigError::InvalidForgetting(_))
        ));

        let bad_prior = AdvisorConfig {
            prior_delta: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(bad_prior.validate(), Err(ConfigError::InvalidPrior(_))));

        let no_types = AdvisorConfig {
            fallback_activity_types: vec![],
            ..Default::default()
        };
        assert!(matches!(no_types.validate(), Err(ConfigError::NoActivityTypes)));
    }

    #[test]
    fn rejects_oversized_window_and_bins() {
        let long_window = AdvisorConfig {
            window_days: 200_000_000,
            ..Default::default()
        };
        assert!(matches!(
            long_window.validate(),
            Err(ConfigError::WindowTooLong { .. })
        ));

        let huge_bins = AdvisorConfig {
            bins: 1_000_000,
            ..Default::default()
        };
        assert!(matches!(
            huge_bins.validate(),
            Err(ConfigError::TooManyBins { .. })
        ));
    }

    #[test]
    fn rejects_malformed_night_times() {
        let config = AdvisorConfig {
            night_start: "9pm".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTime(_))));
    }

    #[test]
    fn target_time_uses_quiz_hour() {
        let config = AdvisorConfig::default();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            config.target_time(date),
            date.and_hms_opt(12, 0, 0).unwrap()
        );
    }

    #[test]
    fn effective_budget_falls_back_on_invalid_input() {
        let config = AdvisorConfig::default();
        assert_eq!(config.effective_budget(4.0), 4.0);
        assert_eq!(config.effective_budget(0.0), 10.0);
        assert_eq!(config.effective_budget(f64::NAN), 10.0);
    }
}
