//! Temporal Feature Builder
//!
//! Turns a study history and a target time into an (activity type × bin)
//! grid of accumulated seconds. Bins only cover waking hours: the daily
//! night interval is cut out of the timeline before it is divided.
//!
//! - [`NightWindow`] - daily excluded interval, may wrap midnight
//! - [`BinLayout`] - window length, bin count and bin start computation
//! - [`FeatureBuilder`] - session scan and grid accumulation

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::config::AdvisorConfig;
use crate::error::ConfigError;
use crate::types::{StudySession, MAX_BINS, MAX_WINDOW_DAYS, SECONDS_PER_DAY};

// ==================== Night Window ====================

/// Daily `[start, end)` interval during which no study is assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl NightWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ConfigError> {
        if start == end {
            return Err(ConfigError::NightCoversDay {
                start: start.format("%H:%M").to_string(),
                end: end.format("%H:%M").to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse two `HH:MM` times of day.
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        let parse = |raw: &str| {
            NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .map_err(|_| ConfigError::InvalidTime(raw.to_string()))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end < self.start
    }

    pub fn duration_secs(&self) -> i64 {
        let secs = (self.end - self.start).num_seconds();
        if self.wraps_midnight() {
            secs + SECONDS_PER_DAY
        } else {
            secs
        }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        let tod = t.time();
        if self.wraps_midnight() {
            tod >= self.start || tod < self.end
        } else {
            tod >= self.start && tod < self.end
        }
    }

    /// First waking instant after a night-time `t`.
    pub fn wake_after(&self, t: NaiveDateTime) -> NaiveDateTime {
        let end = t.date().and_time(self.end);
        if end <= t {
            end + Duration::days(1)
        } else {
            end
        }
    }
}

// ==================== Bin Layout ====================

/// Window length, bin count and night exclusion for one training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinLayout {
    window_days: u32,
    bins: usize,
    night: NightWindow,
}

impl BinLayout {
    pub fn new(window_days: u32, bins: usize, night: NightWindow) -> Result<Self, ConfigError> {
        if bins == 0 {
            return Err(ConfigError::ZeroBins);
        }
        if bins > MAX_BINS {
            return Err(ConfigError::TooManyBins {
                bins,
                max: MAX_BINS,
            });
        }
        if window_days == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if window_days > MAX_WINDOW_DAYS {
            return Err(ConfigError::WindowTooLong {
                days: window_days,
                max: MAX_WINDOW_DAYS,
            });
        }
        Ok(Self {
            window_days,
            bins,
            night,
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    pub fn night(&self) -> &NightWindow {
        &self.night
    }

    pub fn waking_secs_per_day(&self) -> i64 {
        SECONDS_PER_DAY - self.night.duration_secs()
    }

    /// Waking seconds in the window divided evenly over the bins.
    pub fn bin_duration_secs(&self) -> f64 {
        self.window_days as f64 * self.waking_secs_per_day() as f64 / self.bins as f64
    }

    fn bin_width(&self) -> Duration {
        Duration::microseconds((self.bin_duration_secs() * 1e6).round() as i64)
    }

    fn window(&self) -> Duration {
        Duration::days(i64::from(self.window_days))
    }

    /// `night_end` on the target's calendar day, `window_days` earlier.
    /// Saturates at the earliest representable instant.
    pub fn window_start(&self, target: NaiveDateTime) -> NaiveDateTime {
        target
            .date()
            .and_time(self.night.end)
            .checked_sub_signed(self.window())
            .unwrap_or(NaiveDateTime::MIN)
    }

    /// Exactly `bins` start instants, none of which falls in the night.
    pub fn bin_starts(&self, target: NaiveDateTime) -> Vec<NaiveDateTime> {
        let width = self.bin_width();
        let mut starts = Vec::with_capacity(self.bins);
        let mut cur = self.window_start(target);

        while starts.len() < self.bins {
            if self.night.contains(cur) {
                cur = self.night.wake_after(cur);
                continue;
            }
            starts.push(cur);
            cur += width;
        }

        starts
    }

    pub fn timeline(&self, target: NaiveDateTime) -> BinTimeline {
        BinTimeline {
            starts: self.bin_starts(target),
            width: self.bin_width(),
        }
    }
}

/// Concrete bins for one target time.
#[derive(Debug, Clone)]
pub struct BinTimeline {
    starts: Vec<NaiveDateTime>,
    width: Duration,
}

impl BinTimeline {
    pub fn starts(&self) -> &[NaiveDateTime] {
        &self.starts
    }

    /// The bin whose `[start, start + width)` contains `t`.
    pub fn locate(&self, t: NaiveDateTime) -> Option<usize> {
        // starts are at least `width` apart, so only the last start <= t can match
        let idx = self.starts.partition_point(|s| *s <= t);
        if idx == 0 {
            return None;
        }
        let bin = idx - 1;
        if t < self.starts[bin] + self.width {
            Some(bin)
        } else {
            None
        }
    }
}

// ==================== Feature Grid ====================

/// Row-major S×B grid of seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGrid {
    activity_types: Vec<String>,
    bins: usize,
    cells: Vec<f64>,
}

impl FeatureGrid {
    pub fn new(activity_types: &[String], bins: usize) -> Self {
        Self {
            activity_types: activity_types.to_vec(),
            bins,
            cells: vec![0.0; activity_types.len() * bins],
        }
    }

    pub fn activity_types(&self) -> &[String] {
        &self.activity_types
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn get(&self, row: usize, bin: usize) -> f64 {
        self.cells[row * self.bins + bin]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.cells[row * self.bins..(row + 1) * self.bins]
    }

    fn add(&mut self, row: usize, bin: usize, secs: f64) {
        self.cells[row * self.bins + bin] += secs;
    }

    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.cells
    }

    /// Flattened feature vector, activity type 0's bins first.
    pub fn into_vector(self) -> Vec<f64> {
        self.cells
    }
}

// ==================== Builder ====================

/// A session whose start time parsed.
#[derive(Debug, Clone, Copy)]
pub struct TimedSession<'a> {
    pub session: &'a StudySession,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    layout: BinLayout,
    future_tolerance: Option<usize>,
}

impl FeatureBuilder {
    pub fn new(layout: BinLayout, future_tolerance: Option<usize>) -> Self {
        Self {
            layout,
            future_tolerance,
        }
    }

    pub fn from_config(config: &AdvisorConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.feature_layout()?, config.future_tolerance))
    }

    pub fn layout(&self) -> &BinLayout {
        &self.layout
    }

    /// Sessions with `target − window ≤ t ≤ target`.
    ///
    /// With a tolerance of `n`, the scan stops once more than `n` sessions
    /// after the target have been seen; the history is assumed to be roughly
    /// chronological. Without one, the whole history is filtered.
    pub fn scan_window<'a>(
        &self,
        sessions: &'a [StudySession],
        target: NaiveDateTime,
    ) -> Vec<TimedSession<'a>> {
        let window_start = target
            .checked_sub_signed(self.layout.window())
            .unwrap_or(NaiveDateTime::MIN);
        let mut results = Vec::new();
        let mut future_count = 0usize;

        for session in sessions {
            let Some(at) = session.started_at() else {
                continue;
            };
            if at < window_start {
                continue;
            }
            if at > target {
                future_count += 1;
                match self.future_tolerance {
                    Some(limit) if future_count > limit => break,
                    _ => continue,
                }
            }
            results.push(TimedSession { session, at });
        }

        results
    }

    /// Accumulate in-window sessions into a grid over `activity_types`.
    /// Types are matched after trimming surrounding whitespace. Sessions of
    /// other types, or outside every bin, are dropped.
    pub fn build_grid(
        &self,
        target: NaiveDateTime,
        window: &[TimedSession<'_>],
        activity_types: &[String],
    ) -> FeatureGrid {
        let mut grid = FeatureGrid::new(activity_types, self.layout.bins);
        let timeline = self.layout.timeline(target);
        let index: HashMap<&str, usize> = activity_types
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        for entry in window {
            // same key as the type union built during retraining
            let Some(&row) = index.get(entry.session.study_type.trim()) else {
                continue;
            };
            if let Some(bin) = timeline.locate(entry.at) {
                grid.add(row, bin, entry.session.duration_secs());
            }
        }

        grid
    }

    /// Scan and accumulate in one step.
    pub fn build(
        &self,
        target: NaiveDateTime,
        sessions: &[StudySession],
        activity_types: &[String],
    ) -> FeatureGrid {
        let window = self.scan_window(sessions, target);
        self.build_grid(target, &window, activity_types)
    }
}
