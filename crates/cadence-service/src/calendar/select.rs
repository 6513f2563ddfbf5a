//! Picks the current and next occurrence relative to an instant.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use cadence_core::config::FilterConfig;
use chrono::{DateTime, Utc};

use super::timeline::{EventTimeline, TimelineEntry};

/// Returns `true` for UIDs that must not be selected.
pub type HidePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Visibility policy applied before selection.
///
/// Cancelled occurrences are never selected, whatever the settings.
#[derive(Clone, Default)]
pub struct SelectionFilter {
    hidden_uids: HashSet<String>,
    exclude_all_day: bool,
    exclude_transparent: bool,
    hide: Option<HidePredicate>,
}

impl SelectionFilter {
    /// Admits everything except cancelled occurrences.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            hidden_uids: config.hidden_uids.iter().cloned().collect(),
            exclude_all_day: config.exclude_all_day,
            exclude_transparent: config.exclude_transparent,
            hide: None,
        }
    }

    #[must_use]
    pub fn with_hidden_uid(mut self, uid: impl Into<String>) -> Self {
        self.hidden_uids.insert(uid.into());
        self
    }

    #[must_use]
    pub const fn with_exclude_all_day(mut self, exclude: bool) -> Self {
        self.exclude_all_day = exclude;
        self
    }

    #[must_use]
    pub const fn with_exclude_transparent(mut self, exclude: bool) -> Self {
        self.exclude_transparent = exclude;
        self
    }

    /// Installs an external visibility predicate, consulted after the
    /// built-in rules.
    #[must_use]
    pub fn with_predicate(mut self, hide: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.hide = Some(Arc::new(hide));
        self
    }

    /// Whether `entry` may be selected.
    #[must_use]
    pub fn admits(&self, entry: &TimelineEntry) -> bool {
        let occurrence = &entry.occurrence;
        if occurrence.details.is_cancelled() {
            return false;
        }
        if self.hidden_uids.contains(occurrence.uid()) {
            return false;
        }
        if self.exclude_all_day && occurrence.is_all_day() {
            return false;
        }
        if self.exclude_transparent && occurrence.details.is_transparent() {
            return false;
        }
        self.hide.as_ref().is_none_or(|hide| !hide(occurrence.uid()))
    }
}

impl fmt::Debug for SelectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionFilter")
            .field("hidden_uids", &self.hidden_uids)
            .field("exclude_all_day", &self.exclude_all_day)
            .field("exclude_transparent", &self.exclude_transparent)
            .field("has_predicate", &self.hide.is_some())
            .finish()
    }
}

/// The occurrences a display cares about at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub current: Option<Arc<TimelineEntry>>,
    pub next: Option<Arc<TimelineEntry>>,
}

/// ## Summary
/// Finds the current and next occurrence at `now`.
///
/// Current is the admitted entry with `start <= now < end` and the latest
/// start; among equal starts the earliest end wins. Next is the admitted
/// entry with the smallest `start > now`.
#[must_use]
pub fn select(timeline: &EventTimeline, now: DateTime<Utc>, filter: &SelectionFilter) -> Selection {
    let current = timeline
        .started_by(now)
        .iter()
        .filter(|entry| entry.is_ongoing_at(now) && filter.admits(entry))
        // Ascending by (start, end), so replacing only on a strictly later
        // start keeps the earliest end.
        .fold(None::<&Arc<TimelineEntry>>, |best, entry| match best {
            Some(best) if best.start >= entry.start => Some(best),
            _ => Some(entry),
        })
        .cloned();

    let next = timeline
        .starting_after(now)
        .iter()
        .find(|entry| filter.admits(entry))
        .cloned();

    Selection { current, next }
}

#[cfg(test)]
#[path = "select_tests.rs"]
mod tests;
