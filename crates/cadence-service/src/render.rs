//! Data handed to an external renderer.
//!
//! The shape is stable: renderers should not need to know about timelines,
//! rules or timezones.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calendar::TimelineEntry;
use crate::countdown::{CountdownSnapshot, Urgency, gap_seconds};

/// Display fields of one selected occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayEvent {
    pub title: String,
    pub start_instant: DateTime<Utc>,
    pub duration_seconds: i64,
    pub seconds_until_start: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conference_url: Option<String>,
}

impl DisplayEvent {
    #[must_use]
    pub fn from_entry(entry: &TimelineEntry, now: DateTime<Utc>) -> Self {
        let details = &entry.occurrence.details;
        Self {
            title: details.summary.clone().unwrap_or_default(),
            start_instant: entry.start,
            duration_seconds: entry.duration().num_seconds(),
            seconds_until_start: gap_seconds(now, entry.start),
            location: details.location.clone(),
            all_day: entry.occurrence.is_all_day(),
            conference_url: details.extensions.conference_url.clone(),
        }
    }
}

/// What the renderer draws for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RenderPayload {
    /// Neither a current nor a next occurrence.
    NoMeetings {
        stale: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data_age_seconds: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Meetings {
        urgency: Urgency,
        #[serde(skip_serializing_if = "Option::is_none")]
        gap_seconds: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current: Option<DisplayEvent>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next: Option<DisplayEvent>,
        stale: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data_age_seconds: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl RenderPayload {
    #[must_use]
    pub fn from_snapshot(snapshot: &CountdownSnapshot) -> Self {
        let now = snapshot.computed_at;
        if snapshot.current.is_none() && snapshot.next.is_none() {
            return Self::NoMeetings {
                stale: snapshot.stale,
                data_age_seconds: snapshot.data_age_seconds,
                error: snapshot.error.clone(),
            };
        }
        Self::Meetings {
            urgency: snapshot.urgency,
            gap_seconds: snapshot.gap_seconds,
            current: snapshot
                .current
                .as_deref()
                .map(|entry| DisplayEvent::from_entry(entry, now)),
            next: snapshot
                .next
                .as_deref()
                .map(|entry| DisplayEvent::from_entry(entry, now)),
            stale: snapshot.stale,
            data_age_seconds: snapshot.data_age_seconds,
            error: snapshot.error.clone(),
        }
    }

    /// ## Summary
    /// Serializes the payload as JSON.
    ///
    /// ## Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
