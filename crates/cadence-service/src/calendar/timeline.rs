//! Merged, ordered occurrences from every source calendar.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use cadence_rfc::rfc::ical::core::Occurrence;
use cadence_rfc::rfc::ical::expand::{Expansion, TimeZoneResolver};
use chrono::{DateTime, TimeDelta, Utc};

/// An occurrence with its interval resolved to absolute instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub occurrence: Occurrence,
    pub start: DateTime<Utc>,
    /// Never before `start`.
    pub end: DateTime<Utc>,
}

impl TimelineEntry {
    #[must_use]
    pub fn uid(&self) -> &str {
        self.occurrence.uid()
    }

    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Whether `[start, end)` meets `[from, to)`. A zero-length entry meets
    /// the window when its start lies inside it.
    #[must_use]
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start < to && (self.end > from || self.start >= from)
    }

    /// `start <= now < end`
    #[must_use]
    pub fn is_ongoing_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }
}

/// Identity of an occurrence across sources: the event UID plus the
/// instant of the generated instance it stands for.
type InstanceKey = (String, DateTime<Utc>);

/// An immutable timeline, rebuilt wholesale on every refresh.
///
/// Entries are sorted by start, then end, then UID. No two entries share
/// an `(uid, instance)` key.
#[derive(Debug, Clone, Default)]
pub struct EventTimeline {
    entries: Vec<Arc<TimelineEntry>>,
    /// Longest entry, bounds how far back an overlap query must look.
    max_span: TimeDelta,
}

impl EventTimeline {
    /// ## Summary
    /// Merges expansions from any number of sources into one timeline.
    ///
    /// Occurrences are keyed by `(uid, instance)`. When a key repeats, an
    /// override replaces a generated occurrence; otherwise the one with the
    /// higher sequence wins and the first seen is kept on a tie.
    #[must_use]
    pub fn merge(
        expansions: impl IntoIterator<Item = Expansion>,
        resolver: &TimeZoneResolver,
    ) -> Self {
        let mut slots: BTreeMap<InstanceKey, Occurrence> = BTreeMap::new();
        let mut replaced = 0usize;

        for expansion in expansions {
            for occurrence in expansion.occurrences {
                let key = (
                    occurrence.uid().to_string(),
                    resolver.instant(&occurrence.instance),
                );
                match slots.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(occurrence);
                    }
                    Entry::Occupied(mut slot) => {
                        if supersedes(&occurrence, slot.get()) {
                            slot.insert(occurrence);
                        }
                        replaced += 1;
                    }
                }
            }
        }

        let mut entries: Vec<Arc<TimelineEntry>> = slots
            .into_values()
            .map(|occurrence| {
                let start = resolver.instant(&occurrence.start);
                let end = resolver.instant(&occurrence.end).max(start);
                Arc::new(TimelineEntry {
                    occurrence,
                    start,
                    end,
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(a.end.cmp(&b.end))
                .then_with(|| a.uid().cmp(b.uid()))
        });

        let max_span = entries
            .iter()
            .map(|entry| entry.duration())
            .max()
            .unwrap_or_else(TimeDelta::zero);

        tracing::debug!(
            entries = entries.len(),
            collisions = replaced,
            "merged timeline"
        );

        Self { entries, max_span }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TimelineEntry>> {
        self.entries.iter()
    }

    /// ## Summary
    /// Entries whose `[start, end)` intersects `[from, to)`, in timeline
    /// order.
    ///
    /// Binary search bounds the scan to entries starting in
    /// `[from - longest entry, to)`.
    pub fn overlapping(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = &Arc<TimelineEntry>> {
        self.candidates(from, to)
            .iter()
            .filter(move |entry| entry.overlaps(from, to))
    }

    /// Entries that have started at or before `now` and could still be
    /// running.
    pub(crate) fn started_by(&self, now: DateTime<Utc>) -> &[Arc<TimelineEntry>] {
        let lo = self.lower_bound(now);
        let hi = self.entries.partition_point(|entry| entry.start <= now);
        self.entries.get(lo..hi).unwrap_or_default()
    }

    /// Entries starting strictly after `now`.
    pub(crate) fn starting_after(&self, now: DateTime<Utc>) -> &[Arc<TimelineEntry>] {
        let idx = self.entries.partition_point(|entry| entry.start <= now);
        self.entries.get(idx..).unwrap_or_default()
    }

    fn candidates(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> &[Arc<TimelineEntry>] {
        let lo = self.lower_bound(from);
        let hi = self.entries.partition_point(|entry| entry.start < to);
        self.entries.get(lo..hi).unwrap_or_default()
    }

    fn lower_bound(&self, from: DateTime<Utc>) -> usize {
        match from.checked_sub_signed(self.max_span) {
            Some(earliest) => self.entries.partition_point(|entry| entry.start < earliest),
            None => 0,
        }
    }
}

fn supersedes(candidate: &Occurrence, existing: &Occurrence) -> bool {
    match (candidate.is_override, existing.is_override) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.details.sequence > existing.details.sequence,
    }
}

#[cfg(test)]
#[path = "timeline_tests.rs"]
mod tests;
