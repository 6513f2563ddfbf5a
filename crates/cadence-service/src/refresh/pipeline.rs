use cadence_core::config::{ExpansionConfig, Settings};
use cadence_rfc::rfc::ical::expand::{Expansion, Horizon, RecurrenceExpander, TimeZoneResolver};
use cadence_rfc::rfc::ical::parse::ingest;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::source::{EventSource, SourceBatch};
use crate::calendar::{EventTimeline, Selection, SelectionFilter, select};
use crate::error::{RefreshFailure, ServiceResult};

/// Product of one successful slow cycle.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub timeline: EventTimeline,
    pub selection: Selection,
    pub skipped: usize,
    pub warnings: usize,
}

/// Fetch, ingest, expand, merge and select.
#[derive(Debug, Clone)]
pub struct RefreshPipeline {
    resolver: TimeZoneResolver,
    expansion: ExpansionConfig,
    filter: SelectionFilter,
}

impl RefreshPipeline {
    #[must_use]
    pub fn new(
        resolver: TimeZoneResolver,
        expansion: ExpansionConfig,
        filter: SelectionFilter,
    ) -> Self {
        Self {
            resolver,
            expansion,
            filter,
        }
    }

    /// ## Summary
    /// Builds the pipeline from the `[timezone]`, `[expansion]` and
    /// `[filter]` settings.
    ///
    /// ## Errors
    /// Returns `ServiceError::Conversion` if the assumed zone is unknown.
    pub fn from_settings(settings: &Settings) -> ServiceResult<Self> {
        Ok(Self::new(
            TimeZoneResolver::from_config(&settings.timezone)?,
            settings.expansion.clone(),
            SelectionFilter::from_config(&settings.filter),
        ))
    }

    /// Replaces the selection filter, e.g. to add an external predicate.
    #[must_use]
    pub fn with_filter(mut self, filter: SelectionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// ## Summary
    /// Runs one complete cycle against `source`.
    ///
    /// The build runs on the blocking pool. Dropping the returned future
    /// tells the build to stop at its next checkpoint and discards its
    /// result; the pipeline keeps its previous timezone cache in that case.
    ///
    /// Per-event problems are logged and counted, never returned.
    ///
    /// ## Errors
    /// Returns `ServiceError::Refresh` if the source fails or the build task
    /// does not complete.
    #[tracing::instrument(skip_all, fields(%now))]
    pub async fn run<S: EventSource>(
        &mut self,
        source: &S,
        now: DateTime<Utc>,
    ) -> ServiceResult<RefreshOutcome> {
        let batches = source.fetch().await?;

        let abandon = CancellationToken::new();
        let _abandon_on_drop = abandon.clone().drop_guard();
        let mut pipeline = self.clone();
        let span = tracing::Span::current();
        let (pipeline, outcome) = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let outcome = pipeline.build(batches, now, &abandon);
            (pipeline, outcome)
        })
        .await
        .map_err(RefreshFailure::from)?;

        let outcome = outcome?;
        *self = pipeline;
        Ok(outcome)
    }

    /// ## Summary
    /// The CPU part of a cycle: turns fetched records into a timeline and a
    /// selection at `now`.
    ///
    /// `abandon` is checked between events and before selection.
    ///
    /// ## Errors
    /// Returns `RefreshFailure::Abandoned` once `abandon` is cancelled.
    pub fn build(
        &mut self,
        batches: Vec<SourceBatch>,
        now: DateTime<Utc>,
        abandon: &CancellationToken,
    ) -> Result<RefreshOutcome, RefreshFailure> {
        let horizon = Horizon::from_config(now, &self.expansion);
        let mut expansions = Vec::with_capacity(batches.len());
        let mut skipped = 0;
        let mut warnings = 0;

        for batch in batches {
            let report = ingest(batch.records, &mut self.resolver);
            let expander = RecurrenceExpander::new(&self.resolver);
            let mut expansion = Expansion::default();
            for event in &report.events {
                if abandon.is_cancelled() {
                    return Err(RefreshFailure::Abandoned);
                }
                expansion.extend(expander.expand(event, &horizon));
            }

            tracing::debug!(
                source = %batch.source_id,
                events = report.events.len(),
                skipped = report.skipped(),
                occurrences = expansion.occurrences.len(),
                truncated = expansion.truncated,
                "expanded source"
            );

            skipped += report.skipped();
            warnings += report.warnings.len() + expansion.warnings.len();
            expansions.push(expansion);
        }

        let timeline = EventTimeline::merge(expansions, &self.resolver);
        if abandon.is_cancelled() {
            return Err(RefreshFailure::Abandoned);
        }
        let selection = select(&timeline, now, &self.filter);

        tracing::debug!(
            entries = timeline.len(),
            current = selection.current.as_ref().map(|entry| entry.uid()),
            next = selection.next.as_ref().map(|entry| entry.uid()),
            "refresh built timeline"
        );

        Ok(RefreshOutcome {
            timeline,
            selection,
            skipped,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cadence_core::types::UntilBoundary;
    use cadence_rfc::rfc::ical::parse::{EventRecord, TimeProperty};
    use chrono::TimeZone;

    fn record(uid: &str, start: &str, rrule: Option<&str>) -> EventRecord {
        EventRecord {
            uid: uid.to_string(),
            dtstart: Some(TimeProperty::new(start)),
            duration: Some("PT30M".to_string()),
            rrule: rrule.map(str::to_string),
            summary: Some(uid.to_string()),
            ..EventRecord::default()
        }
    }

    fn pipeline() -> RefreshPipeline {
        RefreshPipeline::new(
            TimeZoneResolver::new(),
            ExpansionConfig {
                max_instances: 1000,
                window_days: 730,
                lookback_hours: 24,
                until_boundary: UntilBoundary::Inclusive,
            },
            SelectionFilter::new(),
        )
    }

    #[test_log::test]
    fn test_build_merges_sources_and_selects() {
        let now = Utc.with_ymd_and_hms(2026, 1, 14, 9, 50, 0).unwrap();
        let batches = vec![
            SourceBatch::new(
                "work",
                vec![
                    record("standup", "20260105T100000Z", Some("FREQ=DAILY")),
                    EventRecord {
                        uid: "broken".to_string(),
                        ..EventRecord::default()
                    },
                ],
            ),
            SourceBatch::new("home", vec![record("call", "20260114T093000Z", None)]),
        ];

        let outcome = pipeline()
            .build(batches, now, &CancellationToken::new())
            .unwrap();

        assert_eq!(outcome.skipped, 1);
        let current = outcome.selection.current.unwrap();
        assert_eq!(current.uid(), "call");
        let next = outcome.selection.next.unwrap();
        assert_eq!(next.uid(), "standup");
        assert_eq!(next.start, Utc.with_ymd_and_hms(2026, 1, 14, 10, 0, 0).unwrap());
    }

    #[test_log::test]
    fn test_build_counts_rule_warnings() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let batches = vec![SourceBatch::new(
            "work",
            vec![record(
                "weird",
                "20260105T100000Z",
                Some("FREQ=WEEKLY;COUNT=3;UNTIL=20260301T000000Z"),
            )],
        )];

        let outcome = pipeline()
            .build(batches, now, &CancellationToken::new())
            .unwrap();

        assert_eq!(outcome.warnings, 1);
        assert_eq!(outcome.timeline.len(), 1);
    }

    #[test_log::test]
    fn test_build_stops_once_abandoned() {
        let now = Utc.with_ymd_and_hms(2026, 1, 14, 9, 50, 0).unwrap();
        let batches = vec![SourceBatch::new(
            "work",
            vec![record("standup", "20260105T100000Z", Some("FREQ=DAILY"))],
        )];
        let abandon = CancellationToken::new();
        abandon.cancel();

        let result = pipeline().build(batches, now, &abandon);

        assert!(matches!(result, Err(RefreshFailure::Abandoned)));
    }
}
