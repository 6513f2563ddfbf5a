//! Base event definitions and the occurrences expanded from them.

use std::sync::Arc;

use chrono::TimeDelta;

use super::rrule::RRule;
use super::time::EventTime;

/// Event status (RFC 5545 §3.8.1.11).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    /// Parses a STATUS value (case-insensitive). Unknown values yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "CONFIRMED" => Self::Confirmed,
            "TENTATIVE" => Self::Tentative,
            "CANCELLED" => Self::Cancelled,
            _ => return None,
        })
    }
}

/// Time transparency (RFC 5545 §3.8.2.7). `Opaque` blocks time; `Transparent`
/// is "free".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Transparency {
    #[default]
    Opaque,
    Transparent,
}

impl Transparency {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "OPAQUE" => Self::Opaque,
            "TRANSPARENT" => Self::Transparent,
            _ => return None,
        })
    }
}

/// Outlook's `X-MICROSOFT-CDO-BUSYSTATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusyStatus {
    Free,
    Tentative,
    Busy,
    OutOfOffice,
    WorkingElsewhere,
}

impl BusyStatus {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "FREE" => Self::Free,
            "TENTATIVE" => Self::Tentative,
            "BUSY" => Self::Busy,
            "OOF" => Self::OutOfOffice,
            "WORKINGELSEWHERE" => Self::WorkingElsewhere,
            _ => return None,
        })
    }
}

/// Recognized vendor extension properties. Anything else is dropped at
/// ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventExtensions {
    /// `X-MICROSOFT-CDO-BUSYSTATUS`
    pub busy_status: Option<BusyStatus>,
    /// `X-MICROSOFT-CDO-ALLDAYEVENT`
    pub all_day_hint: Option<bool>,
    /// `X-GOOGLE-CONFERENCE`
    pub conference_url: Option<String>,
    /// `X-APPLE-TRAVEL-ADVISORY-BEHAVIOR`
    pub travel_advisory: Option<String>,
}

/// The descriptive half of an event, shared by every occurrence expanded
/// from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDetails {
    pub uid: String,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub status: EventStatus,
    pub transparency: Transparency,
    pub sequence: u32,
    pub extensions: EventExtensions,
}

impl EventDetails {
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_transparency(mut self, transparency: Transparency) -> Self {
        self.transparency = transparency;
        self
    }

    #[must_use]
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.status, EventStatus::Cancelled)
    }

    /// Free time, either by TRANSP or by Outlook's busy status.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.transparency == Transparency::Transparent
            || self.extensions.busy_status == Some(BusyStatus::Free)
    }
}

/// End of an event: exactly one of DTEND or DURATION.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSpan {
    End(EventTime),
    Duration(TimeDelta),
}

/// A VEVENT as consumed by the expander.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseEvent {
    pub details: Arc<EventDetails>,
    pub start: EventTime,
    pub span: EventSpan,
    pub rrule: Option<RRule>,
    pub exdates: Vec<EventTime>,
    pub rdates: Vec<EventTime>,
    /// Set on a per-instance override; names the generated instance it
    /// replaces.
    pub recurrence_id: Option<EventTime>,
}

impl BaseEvent {
    /// A single event with the given start and span.
    #[must_use]
    pub fn new(details: EventDetails, start: EventTime, span: EventSpan) -> Self {
        Self {
            details: Arc::new(details),
            start,
            span,
            rrule: None,
            exdates: Vec::new(),
            rdates: Vec::new(),
            recurrence_id: None,
        }
    }

    #[must_use]
    pub fn with_rrule(mut self, rrule: RRule) -> Self {
        self.rrule = Some(rrule);
        self
    }

    #[must_use]
    pub fn with_exdates(mut self, exdates: Vec<EventTime>) -> Self {
        self.exdates = exdates;
        self
    }

    #[must_use]
    pub fn with_rdates(mut self, rdates: Vec<EventTime>) -> Self {
        self.rdates = rdates;
        self
    }

    #[must_use]
    pub fn with_recurrence_id(mut self, recurrence_id: EventTime) -> Self {
        self.recurrence_id = Some(recurrence_id);
        self
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.details.uid
    }

    #[must_use]
    pub const fn is_override(&self) -> bool {
        self.recurrence_id.is_some()
    }
}

/// One concrete instance of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub details: Arc<EventDetails>,
    pub start: EventTime,
    pub end: EventTime,
    /// The generated start this occurrence stands for. Equal to `start`
    /// unless this is an override that moved the instance.
    pub instance: EventTime,
    pub is_override: bool,
}

impl Occurrence {
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.details.uid
    }

    /// DATE-valued start, or Outlook's all-day flag.
    #[must_use]
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day() || self.details.extensions.all_day_hint == Some(true)
    }
}
