//! Common Types and Constants
//!
//! Shared data structures used across the feature builder, the estimator and
//! the allocation inverter.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Default forgetting factor λ
pub const DEFAULT_FORGETTING: f64 = 0.99;

/// Default prior scale δ for P = δ·I
pub const DEFAULT_PRIOR_DELTA: f64 = 1e5;

/// Default number of time bins per activity type
pub const DEFAULT_BINS: usize = 50;

/// Default look-back window in days
pub const DEFAULT_WINDOW_DAYS: u32 = 10;

/// Longest accepted look-back window
pub const MAX_WINDOW_DAYS: u32 = 3650;

/// Upper bound on bins per activity type; P grows with (types × bins)²
pub const MAX_BINS: usize = 1000;

/// Rolling (prediction, actual) buffer capacity
pub const RESCALE_CAPACITY: usize = 500;

/// Pairs required before the rescaling fit kicks in
pub const RESCALE_MIN_PAIRS: usize = 3;

/// Near-singular threshold for the rescaling normal equations
pub const RESCALE_SINGULAR_EPS: f64 = 1e-8;

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

/// Condition estimate above which a model is reported unhealthy
pub const MAX_CONDITION_ESTIMATE: f64 = 1e15;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Activity types used when the registry is missing or empty
pub const DEFAULT_ACTIVITY_TYPES: [&str; 3] = ["Top Down", "Bottom Up", "Questions"];

// ==================== History Records ====================

/// A finished study interval.
///
/// Field names follow the on-disk `studyTimes.json` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    /// Seconds studied; negative or non-finite values count as zero
    #[serde(default)]
    pub time_elapsed: f64,
    /// Local wall-clock start time, kept as written
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(default)]
    pub study_type: String,
    /// Label of the to-do item being worked on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StudySession {
    pub fn new(
        course_id: impl Into<String>,
        study_type: impl Into<String>,
        start: NaiveDateTime,
        seconds: f64,
    ) -> Self {
        let end = session_end(start, seconds);
        Self {
            time_elapsed: seconds,
            start_time: start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            end_time: end.map(|end| end.format("%Y-%m-%dT%H:%M:%S").to_string()),
            course_id: course_id.into(),
            content_id: None,
            study_type: study_type.into(),
            name: None,
        }
    }

    /// Parsed start time, `None` when the stored string is not understood.
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.start_time)
    }

    /// Duration clamped to a finite, non-negative number of seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.time_elapsed.is_finite() {
            self.time_elapsed.max(0.0)
        } else {
            0.0
        }
    }
}

/// `start + seconds`, `None` when the length is not representable.
pub fn session_end(start: NaiveDateTime, seconds: f64) -> Option<NaiveDateTime> {
    let millis = (seconds.max(0.0) * 1000.0).round();
    if !(millis.is_finite() && millis < i64::MAX as f64) {
        return None;
    }
    let delta = TimeDelta::try_milliseconds(millis as i64)?;
    start.checked_add_signed(delta)
}

/// Parse a session timestamp into local wall-clock time.
///
/// Accepts RFC 3339, ISO-like `YYYY-MM-DD[T ]HH:MM[:SS[.f]]` and the
/// `M/D/YYYY, h:mm:ss AM` locale form.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    const FORMATS: [&str; 8] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y, %I:%M:%S %p",
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y, %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// One quiz result. Duplicate dates are allowed and count separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRecord {
    pub date: NaiveDate,
    pub score: f64,
}

impl QuizRecord {
    pub fn new(date: NaiveDate, score: f64) -> Self {
        Self { date, score }
    }
}

/// Mean quiz score for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAverage {
    pub date: NaiveDate,
    pub mean_score: f64,
    pub count: usize,
}

// ==================== Model Types ====================

/// Shape of a trained model: how to fold the weight vector back into
/// an (activity type × bin) grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub activity_count: usize,
    pub bins: usize,
    pub activity_types: Vec<String>,
}

impl ModelMetadata {
    pub fn new(activity_types: Vec<String>, bins: usize) -> Self {
        Self {
            activity_count: activity_types.len(),
            bins,
            activity_types,
        }
    }

    pub fn dimension(&self) -> usize {
        self.activity_count * self.bins
    }

    /// `len(activity_types) == S` and `S * B == weight_len`
    pub fn matches(&self, weight_len: usize) -> bool {
        self.activity_count > 0
            && self.bins > 0
            && self.activity_types.len() == self.activity_count
            && self.dimension() == weight_len
    }
}

/// Where an allocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationSource {
    Model,
    EvenSplit,
}

/// Suggested hours per activity type. `labels.len() == hours.len()`,
/// every entry ≥ 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub labels: Vec<String>,
    pub hours: Vec<f64>,
    pub source: AllocationSource,
}

impl Allocation {
    pub fn total_hours(&self) -> f64 {
        self.hours.iter().sum()
    }

    pub fn hours_for(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|idx| self.hours[idx])
    }
}

/// Health report for an estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub is_healthy: bool,
    pub has_nan: bool,
    pub has_inf: bool,
    pub condition_number: f64,
    pub min_diagonal: f64,
    pub max_diagonal: f64,
    pub message: String,
}
