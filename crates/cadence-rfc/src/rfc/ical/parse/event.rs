//! Turns structured event records into [`BaseEvent`]s.
//!
//! A record is the property bag of one VEVENT as delivered by a calendar
//! source. Interpretation of time-classification markers, TZIDs and the
//! RRULE mini-language happens here; everything downstream works on typed
//! values.

use std::collections::BTreeMap;
use std::fmt;

use chrono::TimeDelta;
use serde::Deserialize;

use super::error::ParseError;
use super::values::{parse_boolean, parse_date_or_datetime, parse_duration, parse_rrule};
use crate::error::{RfcError, RfcResult};
use crate::rfc::ical::core::{
    BaseEvent, BusyStatus, EventDetails, EventExtensions, EventSpan, EventStatus, EventTime,
    TimeValue, Transparency,
};
use crate::rfc::ical::expand::{ConversionError, TimeZoneResolver};

/// A DATE or DATE-TIME property with its `TZID` parameter. `value` may hold
/// a comma-separated list where the property allows one (EXDATE, RDATE).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TimeProperty {
    pub value: String,
    #[serde(default)]
    pub tzid: Option<String>,
}

impl TimeProperty {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            tzid: None,
        }
    }

    #[must_use]
    pub fn zoned(value: impl Into<String>, tzid: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            tzid: Some(tzid.into()),
        }
    }
}

/// One VEVENT's properties, as supplied by a calendar source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    pub uid: String,
    pub dtstart: Option<TimeProperty>,
    pub dtend: Option<TimeProperty>,
    pub duration: Option<String>,
    pub rrule: Option<String>,
    pub exdates: Vec<TimeProperty>,
    pub rdates: Vec<TimeProperty>,
    pub recurrence_id: Option<TimeProperty>,
    pub status: Option<String>,
    pub transp: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub sequence: Option<u32>,
    /// Vendor `X-` properties by name.
    pub extensions: BTreeMap<String, String>,
}

/// Something ingestion recovered from without dropping the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestWarning {
    /// The TZID was not recognized; the wall-clock reading was taken as UTC.
    UnknownZone { uid: String, tzid: String },
    /// The RRULE did not parse; the event is treated as non-recurring.
    UnparseableRule { uid: String, error: ParseError },
    /// A STATUS or TRANSP value outside the RFC set; the default was used.
    UnknownValue {
        uid: String,
        property: &'static str,
        value: String,
    },
}

impl fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownZone { uid, tzid } => {
                write!(f, "event {uid}: unknown timezone {tzid:?}, read as UTC")
            }
            Self::UnparseableRule { uid, error } => {
                write!(f, "event {uid}: RRULE ignored: {error}")
            }
            Self::UnknownValue {
                uid,
                property,
                value,
            } => write!(f, "event {uid}: unknown {property} value {value:?}"),
        }
    }
}

/// Outcome of ingesting a batch of records.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub events: Vec<BaseEvent>,
    /// Records that could not become events, with the reason.
    pub rejected: Vec<RfcError>,
    pub warnings: Vec<IngestWarning>,
}

impl IngestReport {
    /// Number of skipped records.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.rejected.len()
    }
}

/// ## Summary
/// Converts records to base events.
///
/// A record that is structurally invalid is skipped and reported; it never
/// prevents the rest of the batch from being ingested.
///
/// ## Side Effects
/// Resolved TZIDs are cached in `resolver`.
pub fn ingest(
    records: impl IntoIterator<Item = EventRecord>,
    resolver: &mut TimeZoneResolver,
) -> IngestReport {
    let mut report = IngestReport::default();
    for record in records {
        match ingest_record(record, resolver, &mut report.warnings) {
            Ok(event) => report.events.push(event),
            Err(error) => {
                tracing::warn!(%error, "skipping malformed event");
                report.rejected.push(error);
            }
        }
    }
    tracing::debug!(
        events = report.events.len(),
        skipped = report.skipped(),
        warnings = report.warnings.len(),
        "ingested event records"
    );
    report
}

fn ingest_record(
    record: EventRecord,
    resolver: &mut TimeZoneResolver,
    warnings: &mut Vec<IngestWarning>,
) -> RfcResult<BaseEvent> {
    let uid = record.uid.trim().to_string();
    if uid.is_empty() {
        return Err(RfcError::malformed("", "missing UID"));
    }

    let dtstart = record
        .dtstart
        .as_ref()
        .ok_or_else(|| RfcError::malformed(&uid, "missing DTSTART"))?;
    let start_value = single_value(&uid, "DTSTART", dtstart)?;
    let start = classify(&uid, &start_value, resolver, warnings);

    let span = match (&record.dtend, &record.duration) {
        (Some(_), Some(_)) => {
            return Err(RfcError::malformed(&uid, "both DTEND and DURATION present"));
        }
        (Some(dtend), None) => {
            let end_value = single_value(&uid, "DTEND", dtend)?;
            if end_value.is_date() != start_value.is_date() {
                return Err(RfcError::malformed(
                    &uid,
                    "DTSTART and DTEND differ in value type",
                ));
            }
            let end = classify(&uid, &end_value, resolver, warnings);
            if resolver.instant(&end) < resolver.instant(&start) {
                return Err(RfcError::malformed(&uid, "DTEND is before DTSTART"));
            }
            EventSpan::End(end)
        }
        (None, Some(duration)) => {
            let duration = parse_duration(duration.trim(), 0)?;
            if duration < TimeDelta::zero() {
                return Err(RfcError::malformed(&uid, "negative DURATION"));
            }
            EventSpan::Duration(duration)
        }
        // RFC 5545 §3.6.1: a DATE start lasts one day, a DATE-TIME start
        // has no duration.
        (None, None) if start.is_all_day() => EventSpan::Duration(TimeDelta::days(1)),
        (None, None) => EventSpan::Duration(TimeDelta::zero()),
    };

    let rrule = match record.rrule.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) => match parse_rrule(text, 0) {
            Ok(rule) => Some(rule),
            Err(error) => {
                tracing::warn!(%uid, %error, "ignoring unparseable RRULE");
                warnings.push(IngestWarning::UnparseableRule {
                    uid: uid.clone(),
                    error,
                });
                None
            }
        },
    };

    let exdates = time_list(&uid, &record.exdates, resolver, warnings)?;
    let rdates = time_list(&uid, &record.rdates, resolver, warnings)?;
    let recurrence_id = match &record.recurrence_id {
        Some(property) => {
            let value = single_value(&uid, "RECURRENCE-ID", property)?;
            Some(classify(&uid, &value, resolver, warnings))
        }
        None => None,
    };

    let extensions = extensions(&uid, &record.extensions);
    let status = keyword(&uid, "STATUS", record.status.as_deref(), EventStatus::parse, warnings);
    let transp = keyword(&uid, "TRANSP", record.transp.as_deref(), Transparency::parse, warnings);
    let transparency = match transp {
        None if extensions.busy_status == Some(BusyStatus::Free) => {
            Some(Transparency::Transparent)
        }
        other => other,
    };

    let details = EventDetails {
        uid,
        summary: record.summary,
        location: record.location,
        status: status.unwrap_or_default(),
        transparency: transparency.unwrap_or_default(),
        sequence: record.sequence.unwrap_or(0),
        extensions,
    };

    let mut event = BaseEvent::new(details, start, span)
        .with_exdates(exdates)
        .with_rdates(rdates);
    event.rrule = rrule;
    event.recurrence_id = recurrence_id;
    Ok(event)
}

fn single_value(uid: &str, name: &str, property: &TimeProperty) -> RfcResult<TimeValue> {
    let text = property.value.trim();
    if text.is_empty() || text.contains(',') {
        return Err(RfcError::malformed(
            uid,
            format!("{name} must hold exactly one value"),
        ));
    }
    Ok(parse_date_or_datetime(text, property.tzid.as_deref(), 0)?)
}

fn time_list(
    uid: &str,
    properties: &[TimeProperty],
    resolver: &mut TimeZoneResolver,
    warnings: &mut Vec<IngestWarning>,
) -> RfcResult<Vec<EventTime>> {
    let mut times = Vec::new();
    for property in properties {
        let mut offset = 0;
        for part in property.value.split(',') {
            let text = part.trim();
            if !text.is_empty() {
                let value = parse_date_or_datetime(text, property.tzid.as_deref(), offset)?;
                times.push(classify(uid, &value, resolver, warnings));
            }
            offset += part.len() + 1;
        }
    }
    Ok(times)
}

/// Resolves a value's zone. An unknown TZID falls back to UTC at the same
/// wall-clock reading and is reported.
fn classify(
    uid: &str,
    value: &TimeValue,
    resolver: &mut TimeZoneResolver,
    warnings: &mut Vec<IngestWarning>,
) -> EventTime {
    match resolver.classify(value) {
        Ok(time) => time,
        Err(ConversionError::UnknownTimezone(tzid)) => {
            tracing::warn!(%uid, %tzid, "unknown timezone, reading as UTC");
            warnings.push(IngestWarning::UnknownZone {
                uid: uid.to_string(),
                tzid,
            });
            match value {
                TimeValue::Date(date) => EventTime::Date(*date),
                TimeValue::DateTime { local, .. } => EventTime::Utc(local.and_utc()),
            }
        }
    }
}

fn keyword<T>(
    uid: &str,
    property: &'static str,
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
    warnings: &mut Vec<IngestWarning>,
) -> Option<T> {
    let value = value?.trim();
    let parsed = parse(value);
    if parsed.is_none() {
        tracing::warn!(%uid, property, value, "unknown property value, using default");
        warnings.push(IngestWarning::UnknownValue {
            uid: uid.to_string(),
            property,
            value: value.to_string(),
        });
    }
    parsed
}

fn extensions(uid: &str, raw: &BTreeMap<String, String>) -> EventExtensions {
    let mut extensions = EventExtensions::default();
    for (name, value) in raw {
        let value = value.trim();
        match name.to_ascii_uppercase().as_str() {
            "X-MICROSOFT-CDO-BUSYSTATUS" => extensions.busy_status = BusyStatus::parse(value),
            "X-MICROSOFT-CDO-ALLDAYEVENT" => {
                extensions.all_day_hint = parse_boolean(value, 0).ok();
            }
            "X-GOOGLE-CONFERENCE" => extensions.conference_url = Some(value.to_string()),
            "X-APPLE-TRAVEL-ADVISORY-BEHAVIOR" => {
                extensions.travel_advisory = Some(value.to_string());
            }
            _ => tracing::trace!(%uid, extension = %name, "ignoring unrecognized extension"),
        }
    }
    extensions
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
