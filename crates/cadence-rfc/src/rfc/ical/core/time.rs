//! Time values and their classification (RFC 5545 §3.3.4, §3.3.5).
//!
//! A parsed value ([`TimeValue`]) still carries its raw `TZID` string. Once
//! the zone has been resolved it becomes an [`EventTime`], which keeps the
//! wall-clock reading and its classification. Floating and date values are
//! never collapsed to an instant here; that only happens at comparison time
//! through the timezone resolver.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// How a parsed DATE-TIME was marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateTimeForm {
    /// Trailing `Z`.
    Utc,
    /// No `Z` and no `TZID`.
    Floating,
    /// A `TZID` parameter was attached.
    Zoned { tzid: String },
}

/// A DATE or DATE-TIME as it appeared in the input, before zone resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeValue {
    Date(NaiveDate),
    DateTime {
        local: NaiveDateTime,
        form: DateTimeForm,
    },
}

impl TimeValue {
    #[must_use]
    pub const fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Attaches a `TZID` to a floating DATE-TIME. UTC and DATE values
    /// ignore it, matching RFC 5545 §3.2.19.
    #[must_use]
    pub fn with_tzid(self, tzid: Option<&str>) -> Self {
        match (self, tzid) {
            (
                Self::DateTime {
                    local,
                    form: DateTimeForm::Floating,
                },
                Some(tzid),
            ) => Self::DateTime {
                local,
                form: DateTimeForm::Zoned {
                    tzid: tzid.to_string(),
                },
            },
            (value, _) => value,
        }
    }
}

/// A resolved time value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTime {
    /// An absolute instant.
    Utc(DateTime<Utc>),
    /// Wall-clock time in a named zone. The local reading may fall in a DST
    /// gap; the resolver decides the instant.
    Zoned { local: NaiveDateTime, tz: Tz },
    /// Wall-clock time with no zone.
    Floating(NaiveDateTime),
    /// All-day value.
    Date(NaiveDate),
}

impl EventTime {
    /// The classification, used to reinterpret other wall-clock values
    /// (UNTIL, generated candidates) in the same frame.
    #[must_use]
    pub const fn form(&self) -> TimeForm {
        match self {
            Self::Utc(_) => TimeForm::Utc,
            Self::Zoned { tz, .. } => TimeForm::Zoned(*tz),
            Self::Floating(_) => TimeForm::Floating,
            Self::Date(_) => TimeForm::Date,
        }
    }

    /// Wall-clock reading in the value's own frame. Dates read as midnight.
    #[must_use]
    pub fn local(&self) -> NaiveDateTime {
        match self {
            Self::Utc(dt) => dt.naive_utc(),
            Self::Zoned { local, .. } | Self::Floating(local) => *local,
            Self::Date(date) => date.and_time(NaiveTime::MIN),
        }
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.local().date()
    }

    #[must_use]
    pub const fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    #[must_use]
    pub const fn is_floating(&self) -> bool {
        matches!(self, Self::Floating(_) | Self::Date(_))
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc(dt) => write!(f, "{}", dt.format("%Y%m%dT%H%M%SZ")),
            Self::Zoned { local, tz } => {
                write!(f, "{};TZID={}", local.format("%Y%m%dT%H%M%S"), tz.name())
            }
            Self::Floating(local) => write!(f, "{}", local.format("%Y%m%dT%H%M%S")),
            Self::Date(date) => write!(f, "{}", date.format("%Y%m%d")),
        }
    }
}

/// The frame of an [`EventTime`] without its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeForm {
    Utc,
    Zoned(Tz),
    Floating,
    Date,
}

impl TimeForm {
    /// Places a wall-clock reading in this frame.
    #[must_use]
    pub fn at(self, local: NaiveDateTime) -> EventTime {
        match self {
            Self::Utc => EventTime::Utc(local.and_utc()),
            Self::Zoned(tz) => EventTime::Zoned { local, tz },
            Self::Floating => EventTime::Floating(local),
            Self::Date => EventTime::Date(local.date()),
        }
    }

    #[must_use]
    pub const fn is_all_day(self) -> bool {
        matches!(self, Self::Date)
    }
}
