use std::fmt;
use std::sync::Arc;

use cadence_core::config::CountdownConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::snapshot::CountdownSnapshot;
use crate::calendar::TimelineEntry;

/// How close the next transition is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Comfortable,
    Tight,
    Critical,
    /// Something has started: either only a current occurrence exists, or
    /// the next one's start has already passed.
    InProgress,
    /// Nothing current, nothing upcoming.
    None,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Comfortable => "comfortable",
            Self::Tight => "tight",
            Self::Critical => "critical",
            Self::InProgress => "in_progress",
            Self::None => "none",
        })
    }
}

/// Gap boundaries in seconds. A gap below `critical` is critical, below
/// `tight` is tight, anything else comfortable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrgencyThresholds {
    pub critical: i64,
    pub tight: i64,
}

impl UrgencyThresholds {
    #[must_use]
    pub const fn from_config(config: &CountdownConfig) -> Self {
        Self {
            critical: config.critical_secs,
            tight: config.tight_secs,
        }
    }

    /// Classifies a signed gap to the next start.
    #[must_use]
    pub const fn urgency(&self, gap_seconds: i64) -> Urgency {
        if gap_seconds < 0 {
            Urgency::InProgress
        } else if gap_seconds < self.critical {
            Urgency::Critical
        } else if gap_seconds < self.tight {
            Urgency::Tight
        } else {
            Urgency::Comfortable
        }
    }
}

impl Default for UrgencyThresholds {
    fn default() -> Self {
        Self {
            critical: 300,
            tight: 900,
        }
    }
}

/// Whole seconds from `now` until `start`, rounded toward negative
/// infinity.
#[must_use]
pub fn gap_seconds(now: DateTime<Utc>, start: DateTime<Utc>) -> i64 {
    (start - now).num_milliseconds().div_euclid(1000)
}

/// ## Summary
/// Classifies with the default thresholds.
#[must_use]
pub fn classify(
    now: DateTime<Utc>,
    current: Option<&Arc<TimelineEntry>>,
    next: Option<&Arc<TimelineEntry>>,
) -> CountdownSnapshot {
    classify_with(&UrgencyThresholds::default(), now, current, next)
}

/// ## Summary
/// Maps `(now, current, next)` to a snapshot. No side effects: equal
/// inputs always give equal output.
///
/// With a next occurrence the gap is measured to its start, and a negative
/// gap reads as in progress. With only a current occurrence the gap is
/// measured to its start (zero or negative) and the state is in progress.
/// With neither the state is `None` and there is no gap.
#[must_use]
pub fn classify_with(
    thresholds: &UrgencyThresholds,
    now: DateTime<Utc>,
    current: Option<&Arc<TimelineEntry>>,
    next: Option<&Arc<TimelineEntry>>,
) -> CountdownSnapshot {
    let (gap, urgency) = match (current, next) {
        (_, Some(next)) => {
            let gap = gap_seconds(now, next.start);
            (Some(gap), thresholds.urgency(gap))
        }
        (Some(current), None) => (Some(gap_seconds(now, current.start)), Urgency::InProgress),
        (None, None) => (None, Urgency::None),
    };

    CountdownSnapshot {
        computed_at: now,
        gap_seconds: gap,
        urgency,
        current: current.cloned(),
        next: next.cloned(),
        stale: false,
        data_age_seconds: None,
        error: None,
    }
}
