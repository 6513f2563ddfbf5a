//! Readers for the RFC 5545 §3.3 value types records carry as text.
//!
//! `offset` arguments locate the value inside a larger input and are only
//! used for error reporting.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{
    DateTimeForm, Frequency, RRule, RRuleUntil, TimeValue, Weekday, WeekdayNum,
};

fn number<T: std::str::FromStr>(s: &str, range: std::ops::Range<usize>) -> Option<T> {
    s.get(range)
        .filter(|v| v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse().ok())
}

/// `YYYYMMDD`.
///
/// ## Errors
/// `InvalidDate` unless `s` is eight digits naming a real calendar day.
pub fn parse_date(s: &str, offset: usize) -> ParseResult<NaiveDate> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidDate, offset).with_context(s);
    if s.len() != 8 {
        return Err(invalid());
    }

    let year = number::<i32>(s, 0..4).ok_or_else(invalid)?;
    let month = number::<u32>(s, 4..6).ok_or_else(invalid)?;
    let day = number::<u32>(s, 6..8).ok_or_else(invalid)?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// `HHMMSS` with an optional `Z`, returned as the time plus whether `Z`
/// was present. A leap second (60) reads as 59.
///
/// ## Errors
/// `InvalidTime` for anything else.
pub fn parse_time(s: &str, offset: usize) -> ParseResult<(NaiveTime, bool)> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidTime, offset).with_context(s);
    let bare = s.strip_suffix('Z');
    let digits = bare.unwrap_or(s);
    if digits.len() != 6 {
        return Err(invalid());
    }

    let hour = number::<u32>(digits, 0..2).ok_or_else(invalid)?;
    let minute = number::<u32>(digits, 2..4).ok_or_else(invalid)?;
    let second = number::<u32>(digits, 4..6).ok_or_else(invalid)?;
    if second > 60 {
        return Err(invalid());
    }

    let time = NaiveTime::from_hms_opt(hour, minute, second.min(59)).ok_or_else(invalid)?;
    Ok((time, bare.is_some()))
}

/// `YYYYMMDDTHHMMSS[Z]`. A trailing `Z` makes the value UTC, otherwise
/// `tzid` (the `TZID` parameter) makes it zoned, otherwise it is floating.
///
/// ## Errors
/// `InvalidDateTime` without a `T` separator; otherwise whatever the date or
/// time half reports.
pub fn parse_datetime(s: &str, tzid: Option<&str>, offset: usize) -> ParseResult<TimeValue> {
    let (date_part, time_part) = s
        .split_once('T')
        .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidDateTime, offset).with_context(s))?;

    let date = parse_date(date_part, offset)?;
    let (time, utc) = parse_time(time_part, offset + date_part.len() + 1)?;

    let form = match (utc, tzid) {
        (true, _) => DateTimeForm::Utc,
        (false, Some(tzid)) => DateTimeForm::Zoned {
            tzid: tzid.to_string(),
        },
        (false, None) => DateTimeForm::Floating,
    };

    Ok(TimeValue::DateTime {
        local: NaiveDateTime::new(date, time),
        form,
    })
}

/// Parses a value that may be either DATE or DATE-TIME, the way DTSTART,
/// DTEND, EXDATE and RDATE accept both.
///
/// ## Errors
/// Returns an error if the string is neither.
pub fn parse_date_or_datetime(
    s: &str,
    tzid: Option<&str>,
    offset: usize,
) -> ParseResult<TimeValue> {
    if s.contains('T') {
        parse_datetime(s, tzid, offset)
    } else {
        parse_date(s, offset).map(TimeValue::Date)
    }
}

/// A signed DURATION such as `PT30M`, `P1W` or `-P1DT2H`. Weeks and days are
/// nominal 24-hour days here.
///
/// ## Errors
/// `InvalidDuration` on bad syntax, units out of order, or overflow.
pub fn parse_duration(s: &str, offset: usize) -> ParseResult<TimeDelta> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidDuration, offset).with_context(s);

    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let body = rest.strip_prefix('P').ok_or_else(invalid)?;
    if body.is_empty() {
        return Err(invalid());
    }

    let mut total = TimeDelta::zero();
    let mut digits = String::new();
    let mut in_time = false;
    let mut seen_component = false;

    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c == 'T' {
            if in_time || !digits.is_empty() {
                return Err(invalid());
            }
            in_time = true;
            continue;
        }

        let n: i64 = digits.parse().ok().ok_or_else(invalid)?;
        digits.clear();
        let component = match (c, in_time) {
            ('W', false) => TimeDelta::try_weeks(n),
            ('D', false) => TimeDelta::try_days(n),
            ('H', true) => TimeDelta::try_hours(n),
            ('M', true) => TimeDelta::try_minutes(n),
            ('S', true) => TimeDelta::try_seconds(n),
            _ => None,
        }
        .ok_or_else(invalid)?;
        total = total.checked_add(&component).ok_or_else(invalid)?;
        seen_component = true;
    }

    if !digits.is_empty() || !seen_component {
        return Err(invalid());
    }

    Ok(if negative { -total } else { total })
}

/// `TRUE` or `FALSE`, in any case.
///
/// ## Errors
/// `InvalidBoolean` for anything else.
pub fn parse_boolean(s: &str, offset: usize) -> ParseResult<bool> {
    match s.to_ascii_uppercase().as_str() {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => Err(ParseError::new(ParseErrorKind::InvalidBoolean, offset).with_context(s)),
    }
}

/// A RECUR value. Unknown parts are skipped; combination checks such as
/// COUNT with UNTIL belong to [`RRule::validate`].
///
/// ## Errors
/// A syntax error in any known part, or a missing FREQ.
pub fn parse_rrule(s: &str, offset: usize) -> ParseResult<RRule> {
    let mut rrule = RRule::new();
    let mut part_offset = offset;

    for part in s.split(';') {
        if !part.is_empty() {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                ParseError::new(ParseErrorKind::InvalidRRule, part_offset).with_context(part)
            })?;
            parse_rrule_part(&mut rrule, key, value, part_offset + key.len() + 1)?;
        }
        part_offset += part.len() + 1;
    }

    if rrule.freq.is_none() {
        return Err(ParseError::new(ParseErrorKind::InvalidFrequency, offset).with_context(s));
    }

    Ok(rrule)
}

fn parse_rrule_part(rrule: &mut RRule, key: &str, value: &str, offset: usize) -> ParseResult<()> {
    match key.to_ascii_uppercase().as_str() {
        "FREQ" => {
            rrule.freq = Some(Frequency::parse(value).ok_or_else(|| {
                ParseError::new(ParseErrorKind::InvalidFrequency, offset).with_context(value)
            })?);
        }
        "INTERVAL" => rrule.interval = Some(parse_number(value, offset)?),
        "COUNT" => rrule.count = Some(parse_number(value, offset)?),
        "UNTIL" => rrule.until = Some(parse_rrule_until(value, offset)?),
        "WKST" => {
            rrule.wkst = Some(Weekday::parse(value).ok_or_else(|| {
                ParseError::new(ParseErrorKind::InvalidWeekday, offset).with_context(value)
            })?);
        }
        "BYSECOND" => rrule.by_second = parse_list(value, offset)?,
        "BYMINUTE" => rrule.by_minute = parse_list(value, offset)?,
        "BYHOUR" => rrule.by_hour = parse_list(value, offset)?,
        "BYDAY" => rrule.by_day = parse_byday(value, offset)?,
        "BYMONTHDAY" => rrule.by_monthday = parse_list(value, offset)?,
        "BYYEARDAY" => rrule.by_yearday = parse_list(value, offset)?,
        "BYWEEKNO" => rrule.by_weekno = parse_list(value, offset)?,
        "BYMONTH" => rrule.by_month = parse_list(value, offset)?,
        "BYSETPOS" => rrule.by_setpos = parse_list(value, offset)?,
        other => tracing::trace!(part = other, "ignoring unknown RRULE part"),
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(value: &str, offset: usize) -> ParseResult<T> {
    value
        .parse()
        .ok()
        .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidInteger, offset).with_context(value))
}

fn parse_rrule_until(value: &str, offset: usize) -> ParseResult<RRuleUntil> {
    match parse_date_or_datetime(value, None, offset)? {
        TimeValue::Date(date) => Ok(RRuleUntil::Date(date)),
        TimeValue::DateTime { local, form } => Ok(RRuleUntil::DateTime {
            local,
            utc: form == DateTimeForm::Utc,
        }),
    }
}

fn parse_list<T: std::str::FromStr>(s: &str, offset: usize) -> ParseResult<Vec<T>> {
    s.split(',')
        .map(|v| {
            v.trim().parse().ok().ok_or_else(|| {
                ParseError::new(ParseErrorKind::InvalidRRule, offset).with_context(v)
            })
        })
        .collect()
}

fn parse_byday(s: &str, offset: usize) -> ParseResult<Vec<WeekdayNum>> {
    s.split(',')
        .map(|v| parse_weekday_num(v.trim(), offset))
        .collect()
}

/// `MO`, `1MO`, `+2TU`, `-1FR`.
fn parse_weekday_num(s: &str, offset: usize) -> ParseResult<WeekdayNum> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidWeekday, offset).with_context(s);

    let split = s.len().checked_sub(2).ok_or_else(invalid)?;
    let ordinal = s.get(..split).ok_or_else(invalid)?;
    let code = s.get(split..).ok_or_else(invalid)?;
    let weekday = Weekday::parse(code).ok_or_else(invalid)?;

    if ordinal.is_empty() {
        return Ok(WeekdayNum::every(weekday));
    }
    let ordinal: i8 = ordinal
        .trim_start_matches('+')
        .parse()
        .ok()
        .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidRRule, offset).with_context(s))?;
    Ok(WeekdayNum::nth(ordinal, weekday))
}
