use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use super::pipeline::RefreshOutcome;
use crate::calendar::{EventTimeline, Selection};

/// What the slow cycle publishes. Each cycle builds a new value from the
/// previous one; nothing is updated in place.
#[derive(Debug, Clone, Default)]
pub struct RefreshState {
    /// The last successfully built timeline, kept across failures.
    pub timeline: Arc<EventTimeline>,
    /// Selection made when `timeline` was built.
    pub selection: Selection,
    /// Instant of the last successful refresh.
    pub fetched_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// First failure since the last success.
    pub failing_since: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Records skipped as malformed in the last successful refresh.
    pub skipped: usize,
    /// Warnings raised in the last successful refresh.
    pub warnings: usize,
}

impl RefreshState {
    /// State after a successful cycle. Failure tracking is reset.
    #[must_use]
    pub fn succeeded(&self, outcome: RefreshOutcome, now: DateTime<Utc>) -> Self {
        if self.consecutive_failures > 0 {
            tracing::info!(
                failures = self.consecutive_failures,
                "refresh recovered"
            );
        }
        Self {
            timeline: Arc::new(outcome.timeline),
            selection: outcome.selection,
            fetched_at: Some(now),
            consecutive_failures: 0,
            failing_since: None,
            last_error: None,
            skipped: outcome.skipped,
            warnings: outcome.warnings,
        }
    }

    /// State after a failed cycle. The timeline and selection are retained.
    #[must_use]
    pub fn failed(&self, error: &impl ToString, now: DateTime<Utc>) -> Self {
        Self {
            consecutive_failures: self.consecutive_failures.saturating_add(1),
            failing_since: self.failing_since.or(Some(now)),
            last_error: Some(error.to_string()),
            ..self.clone()
        }
    }

    /// Time since the last successful refresh.
    #[must_use]
    pub fn data_age(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.fetched_at.map(|fetched_at| now - fetched_at)
    }

    /// The last error, once failures have lasted at least `sustained`.
    #[must_use]
    pub fn surfaced_error(&self, now: DateTime<Utc>, sustained: TimeDelta) -> Option<&str> {
        let since = self.failing_since?;
        if now - since >= sustained {
            self.last_error.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 2, 9, minute, 0).unwrap()
    }

    fn outcome() -> RefreshOutcome {
        RefreshOutcome {
            timeline: EventTimeline::default(),
            selection: Selection::default(),
            skipped: 2,
            warnings: 1,
        }
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let ok = RefreshState::default().succeeded(outcome(), at(0));
        let failed = ok.failed(&"connection refused", at(1));

        assert!(Arc::ptr_eq(&ok.timeline, &failed.timeline));
        assert_eq!(failed.fetched_at, Some(at(0)));
        assert_eq!(failed.consecutive_failures, 1);
        assert_eq!(failed.failing_since, Some(at(1)));
        assert_eq!(failed.skipped, 2);

        let again = failed.failed(&"timeout", at(3));
        assert_eq!(again.consecutive_failures, 2);
        assert_eq!(again.failing_since, Some(at(1)));
        assert_eq!(again.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_error_surfaces_only_when_sustained() {
        let sustained = TimeDelta::minutes(15);
        let failing = RefreshState::default().failed(&"offline", at(0));

        assert_eq!(failing.surfaced_error(at(14), sustained), None);
        assert_eq!(failing.surfaced_error(at(15), sustained), Some("offline"));

        let recovered = failing.succeeded(outcome(), at(16));
        assert_eq!(recovered.surfaced_error(at(59), sustained), None);
        assert_eq!(recovered.consecutive_failures, 0);
    }

    #[test]
    fn test_data_age() {
        assert_eq!(RefreshState::default().data_age(at(5)), None);
        let ok = RefreshState::default().succeeded(outcome(), at(1));
        assert_eq!(ok.data_age(at(5)), Some(TimeDelta::minutes(4)));
    }
}
