use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use super::state::Urgency;
use crate::calendar::TimelineEntry;

/// One fast-tick classification. Replaced, never mutated, by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownSnapshot {
    pub computed_at: DateTime<Utc>,
    /// Signed seconds to the reference start. Negative once it has passed.
    pub gap_seconds: Option<i64>,
    pub urgency: Urgency,
    pub current: Option<Arc<TimelineEntry>>,
    pub next: Option<Arc<TimelineEntry>>,
    /// The data behind this snapshot is older than the staleness limit.
    pub stale: bool,
    /// Seconds since the last successful refresh, if there was one.
    pub data_age_seconds: Option<i64>,
    /// Set only once refresh failures have persisted past the sustained
    /// threshold.
    pub error: Option<String>,
}

impl CountdownSnapshot {
    /// Annotates the snapshot with the age of its data.
    ///
    /// Without any successful refresh the snapshot is stale.
    #[must_use]
    pub fn with_freshness(mut self, age: Option<TimeDelta>, stale_after: TimeDelta) -> Self {
        self.data_age_seconds = age.map(|age| age.num_seconds());
        self.stale = age.is_none_or(|age| age > stale_after);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    /// Whether the two snapshots would render the same, ignoring the
    /// countdown itself.
    #[must_use]
    pub fn same_state(&self, other: &Self) -> bool {
        self.urgency == other.urgency
            && same_entry(self.current.as_ref(), other.current.as_ref())
            && same_entry(self.next.as_ref(), other.next.as_ref())
            && self.stale == other.stale
            && self.error == other.error
    }
}

fn same_entry(a: Option<&Arc<TimelineEntry>>, b: Option<&Arc<TimelineEntry>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.uid() == b.uid() && a.start == b.start && a.end == b.end,
        (None, None) => true,
        _ => false,
    }
}
