//! Time interval primitive used throughout the engine

use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when an interval is built with `end < start`.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid time range: start {start} is after end {end}")]
pub struct InvalidRange {
    pub start: f64,
    pub end: f64,
}

/// A half-open `[start, end)` interval over epoch seconds.
///
/// Construction enforces `start <= end`, so every operation below is total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    start: f64,
    end: f64,
}

impl TimeRange {
    /// Build a range, rejecting inverted or non-finite endpoints.
    pub fn new(start: f64, end: f64) -> Result<Self, InvalidRange> {
        if !start.is_finite() || !end.is_finite() || end < start {
            return Err(InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Internal constructor for endpoints already known to be ordered.
    pub(crate) fn between(start: f64, end: f64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `other` lies entirely inside this range.
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two ranges share a non-empty overlap.
    pub fn intersects(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Overlapping or touching, i.e. the union is one contiguous interval.
    pub fn joins(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Expand both ends by `fraction * width`.
    pub fn padded(&self, fraction: f64) -> TimeRange {
        debug_assert!(fraction >= 0.0);
        let margin = fraction * self.width();
        Self::between(self.start - margin, self.end + margin)
    }

    /// Extend only the leading (left) edge by `margin` seconds.
    pub fn extended_left(&self, margin: f64) -> TimeRange {
        debug_assert!(margin >= 0.0);
        Self::between(self.start - margin, self.end)
    }

    /// Extend only the trailing (right) edge by `margin` seconds.
    pub fn extended_right(&self, margin: f64) -> TimeRange {
        debug_assert!(margin >= 0.0);
        Self::between(self.start, self.end + margin)
    }

    /// Equality up to `epsilon` on both endpoints.
    pub fn approx_equals(&self, other: &TimeRange, epsilon: f64) -> bool {
        (self.start - other.start).abs() <= epsilon && (self.end - other.end).abs() <= epsilon
    }

    /// Union with a joining range; `None` when a gap separates the two.
    pub fn union(&self, other: &TimeRange) -> Option<TimeRange> {
        if !self.joins(other) {
            return None;
        }
        Some(Self::between(
            self.start.min(other.start),
            self.end.max(other.end),
        ))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Render epoch seconds as UTC datetimes when they fit, raw otherwise
        match (format_instant(self.start), format_instant(self.end)) {
            (Some(start), Some(end)) => write!(f, "[{start}, {end})"),
            _ => write!(f, "[{}, {})", self.start, self.end),
        }
    }
}

fn format_instant(seconds: f64) -> Option<String> {
    let secs = seconds.floor();
    let nanos = ((seconds - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos).map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
}
