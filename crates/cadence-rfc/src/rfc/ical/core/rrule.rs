//! The RRULE value (RFC 5545 §3.3.10) and its building blocks.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::RuleError;

/// FREQ. All seven values parse; only `Daily` through `Yearly` expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "SECONDLY" => Self::Secondly,
            "MINUTELY" => Self::Minutely,
            "HOURLY" => Self::Hourly,
            "DAILY" => Self::Daily,
            "WEEKLY" => Self::Weekly,
            "MONTHLY" => Self::Monthly,
            "YEARLY" => Self::Yearly,
            _ => return None,
        })
    }

    /// `false` for the sub-daily frequencies.
    #[must_use]
    pub const fn is_expandable(self) -> bool {
        matches!(
            self,
            Self::Daily | Self::Weekly | Self::Monthly | Self::Yearly
        )
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "SU",
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
        }
    }

    /// Reads a two-letter code, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "SU" => Self::Sunday,
            "MO" => Self::Monday,
            "TU" => Self::Tuesday,
            "WE" => Self::Wednesday,
            "TH" => Self::Thursday,
            "FR" => Self::Friday,
            "SA" => Self::Saturday,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn to_chrono(self) -> chrono::Weekday {
        match self {
            Self::Sunday => chrono::Weekday::Sun,
            Self::Monday => chrono::Weekday::Mon,
            Self::Tuesday => chrono::Weekday::Tue,
            Self::Wednesday => chrono::Weekday::Wed,
            Self::Thursday => chrono::Weekday::Thu,
            Self::Friday => chrono::Weekday::Fri,
            Self::Saturday => chrono::Weekday::Sat,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A BYDAY entry: `MO` is every Monday in the period, `2MO` the second and
/// `-1FR` the last Friday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayNum {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl WeekdayNum {
    #[must_use]
    pub const fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }

    /// Range is not checked here; [`RRule::validate`] rejects zero and values
    /// outside -53..=53.
    #[must_use]
    pub const fn nth(ordinal: i8, weekday: Weekday) -> Self {
        Self {
            ordinal: Some(ordinal),
            weekday,
        }
    }
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ordinal {
            Some(ordinal) => write!(f, "{ordinal}{}", self.weekday),
            None => f.write_str(self.weekday.as_str()),
        }
    }
}

/// The UNTIL part, as DATE or DATE-TIME.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RRuleUntil {
    /// Every candidate on or before this local date qualifies.
    Date(NaiveDate),
    /// `utc` is set when the text ended in `Z`. Without it the value is read
    /// in the start value's own zone.
    DateTime { local: NaiveDateTime, utc: bool },
}

impl fmt::Display for RRuleUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y%m%d")),
            Self::DateTime { local, utc: true } => write!(f, "{}", local.format("%Y%m%dT%H%M%SZ")),
            Self::DateTime { local, utc: false } => write!(f, "{}", local.format("%Y%m%dT%H%M%S")),
        }
    }
}

/// A parsed RRULE value.
///
/// Parsing is permissive: anything syntactically valid is kept, including
/// parts the expander does not handle. [`RRule::validate`] decides whether
/// the rule can be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RRule {
    pub freq: Option<Frequency>,
    pub interval: Option<u32>,
    pub until: Option<RRuleUntil>,
    pub count: Option<u32>,
    pub wkst: Option<Weekday>,
    pub by_second: Vec<u8>,
    pub by_minute: Vec<u8>,
    pub by_hour: Vec<u8>,
    pub by_day: Vec<WeekdayNum>,
    pub by_monthday: Vec<i8>,
    /// Kept for display; rejected by validation.
    pub by_yearday: Vec<i16>,
    /// Kept for display; rejected by validation.
    pub by_weekno: Vec<i8>,
    pub by_month: Vec<u8>,
    pub by_setpos: Vec<i16>,
}

impl RRule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A rule with only FREQ set.
    #[must_use]
    pub fn every(freq: Frequency) -> Self {
        Self {
            freq: Some(freq),
            ..Self::default()
        }
    }

    /// Effective interval (absent means 1).
    #[must_use]
    pub fn interval(&self) -> u32 {
        self.interval.unwrap_or(1)
    }

    /// Effective week start (absent means Monday).
    #[must_use]
    pub fn week_start(&self) -> Weekday {
        self.wkst.unwrap_or(Weekday::Monday)
    }

    /// ## Summary
    /// Checks the rule for combinations the expander cannot honour.
    ///
    /// ## Errors
    /// Returns the first [`RuleError`] found. Callers fall back to a single
    /// occurrence rather than aborting.
    pub fn validate(&self) -> Result<Frequency, RuleError> {
        let freq = self.freq.ok_or(RuleError::MissingFrequency)?;
        if !freq.is_expandable() {
            return Err(RuleError::UnsupportedFrequency(freq));
        }
        if self.count.is_some() && self.until.is_some() {
            return Err(RuleError::CountAndUntil);
        }
        if self.interval == Some(0) {
            return Err(RuleError::ZeroInterval);
        }
        if self.count == Some(0) {
            return Err(RuleError::OutOfRange("COUNT", 0));
        }
        if !self.by_yearday.is_empty() {
            return Err(RuleError::UnsupportedPart("BYYEARDAY"));
        }
        if !self.by_weekno.is_empty() {
            return Err(RuleError::UnsupportedPart("BYWEEKNO"));
        }
        check_range("BYMONTH", self.by_month.iter().map(|&v| i32::from(v)), 1, 12, false)?;
        check_range("BYMONTHDAY", self.by_monthday.iter().map(|&v| i32::from(v)), -31, 31, true)?;
        check_range("BYSETPOS", self.by_setpos.iter().map(|&v| i32::from(v)), -366, 366, true)?;
        check_range("BYHOUR", self.by_hour.iter().map(|&v| i32::from(v)), 0, 23, false)?;
        check_range("BYMINUTE", self.by_minute.iter().map(|&v| i32::from(v)), 0, 59, false)?;
        check_range("BYSECOND", self.by_second.iter().map(|&v| i32::from(v)), 0, 60, false)?;
        check_range(
            "BYDAY",
            self.by_day.iter().filter_map(|wd| wd.ordinal).map(i32::from),
            -53,
            53,
            true,
        )?;

        let has_ordinal = self.by_day.iter().any(|wd| wd.ordinal.is_some());
        if has_ordinal && matches!(freq, Frequency::Daily | Frequency::Weekly) {
            return Err(RuleError::OrdinalOutOfContext(freq));
        }
        if freq == Frequency::Weekly && !self.by_monthday.is_empty() {
            return Err(RuleError::MonthDayOutOfContext);
        }
        if !self.by_setpos.is_empty()
            && self.by_month.is_empty()
            && self.by_day.is_empty()
            && self.by_monthday.is_empty()
            && self.by_hour.is_empty()
            && self.by_minute.is_empty()
            && self.by_second.is_empty()
        {
            return Err(RuleError::SetPosWithoutFilter);
        }
        Ok(freq)
    }
}

fn check_range(
    part: &'static str,
    values: impl Iterator<Item = i32>,
    min: i32,
    max: i32,
    reject_zero: bool,
) -> Result<(), RuleError> {
    for value in values {
        if value < min || value > max || (reject_zero && value == 0) {
            return Err(RuleError::OutOfRange(part, value));
        }
    }
    Ok(())
}

impl fmt::Display for RRule {
    /// Renders RFC text with parts in a fixed order, omitting empty ones and
    /// an INTERVAL of 1.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: ToString>(values: &[T]) -> Option<String> {
            (!values.is_empty()).then(|| {
                values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            })
        }

        let rendered = [
            ("FREQ", self.freq.map(|freq| freq.to_string())),
            (
                "INTERVAL",
                self.interval.filter(|n| *n != 1).map(|n| n.to_string()),
            ),
            ("UNTIL", self.until.map(|until| until.to_string())),
            ("COUNT", self.count.map(|n| n.to_string())),
            ("WKST", self.wkst.map(|wkst| wkst.to_string())),
            ("BYSECOND", list(&self.by_second)),
            ("BYMINUTE", list(&self.by_minute)),
            ("BYHOUR", list(&self.by_hour)),
            ("BYDAY", list(&self.by_day)),
            ("BYMONTHDAY", list(&self.by_monthday)),
            ("BYYEARDAY", list(&self.by_yearday)),
            ("BYWEEKNO", list(&self.by_weekno)),
            ("BYMONTH", list(&self.by_month)),
            ("BYSETPOS", list(&self.by_setpos)),
        ];

        let mut first = true;
        for (name, value) in rendered {
            let Some(value) = value else { continue };
            if !first {
                f.write_str(";")?;
            }
            first = false;
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly_on(days: &[Weekday]) -> RRule {
        RRule {
            by_day: days.iter().copied().map(WeekdayNum::every).collect(),
            ..RRule::every(Frequency::Weekly)
        }
    }

    #[test]
    fn test_display_orders_parts() {
        let rule = RRule {
            count: Some(6),
            interval: Some(2),
            wkst: Some(Weekday::Sunday),
            ..weekly_on(&[Weekday::Tuesday, Weekday::Thursday])
        };
        assert_eq!(
            rule.to_string(),
            "FREQ=WEEKLY;INTERVAL=2;COUNT=6;WKST=SU;BYDAY=TU,TH"
        );
    }

    #[test]
    fn test_display_skips_unit_interval_and_renders_ordinals() {
        let rule = RRule {
            interval: Some(1),
            by_day: vec![WeekdayNum::nth(-1, Weekday::Friday)],
            until: Some(RRuleUntil::DateTime {
                local: NaiveDate::from_ymd_opt(2026, 6, 30)
                    .unwrap()
                    .and_hms_opt(23, 59, 59)
                    .unwrap(),
                utc: true,
            }),
            ..RRule::every(Frequency::Monthly)
        };
        assert_eq!(
            rule.to_string(),
            "FREQ=MONTHLY;UNTIL=20260630T235959Z;BYDAY=-1FR"
        );
    }

    #[test]
    fn test_codes_ignore_case() {
        assert_eq!(Weekday::parse("tH"), Some(Weekday::Thursday));
        assert_eq!(Weekday::parse("XY"), None);
        assert_eq!(Frequency::parse("yearly"), Some(Frequency::Yearly));
        assert_eq!(Frequency::parse("FORTNIGHTLY"), None);
    }

    #[test]
    fn test_validate_rejects_count_with_until() {
        let rule = RRule {
            count: Some(3),
            until: Some(RRuleUntil::Date(NaiveDate::from_ymd_opt(2026, 1, 9).unwrap())),
            ..RRule::every(Frequency::Daily)
        };
        assert_eq!(rule.validate(), Err(RuleError::CountAndUntil));
    }

    #[test]
    fn test_validate_setpos_needs_a_companion_part() {
        let bare = RRule {
            by_setpos: vec![-1],
            ..RRule::every(Frequency::Monthly)
        };
        assert_eq!(bare.validate(), Err(RuleError::SetPosWithoutFilter));

        let last_friday = RRule {
            by_day: vec![WeekdayNum::every(Weekday::Friday)],
            ..bare
        };
        assert_eq!(last_friday.validate(), Ok(Frequency::Monthly));

        let first_listed_month = RRule {
            by_month: vec![1, 6],
            by_setpos: vec![1],
            count: Some(3),
            ..RRule::every(Frequency::Yearly)
        };
        assert_eq!(first_listed_month.validate(), Ok(Frequency::Yearly));
    }

    #[test]
    fn test_validate_rejects_sub_daily_frequency() {
        assert_eq!(
            RRule::every(Frequency::Hourly).validate(),
            Err(RuleError::UnsupportedFrequency(Frequency::Hourly))
        );
    }

    #[test]
    fn test_validate_rejects_ordinal_in_weekly() {
        let rule = RRule {
            by_day: vec![WeekdayNum::nth(2, Weekday::Monday)],
            ..RRule::every(Frequency::Weekly)
        };
        assert_eq!(
            rule.validate(),
            Err(RuleError::OrdinalOutOfContext(Frequency::Weekly))
        );
    }

    #[test]
    fn test_validate_rejects_zero_monthday() {
        let rule = RRule {
            by_monthday: vec![0],
            ..RRule::every(Frequency::Monthly)
        };
        assert_eq!(rule.validate(), Err(RuleError::OutOfRange("BYMONTHDAY", 0)));
    }

    #[test]
    fn test_validate_rejects_unsupported_parts() {
        let rule = RRule {
            by_weekno: vec![20],
            ..RRule::every(Frequency::Yearly)
        };
        assert_eq!(rule.validate(), Err(RuleError::UnsupportedPart("BYWEEKNO")));
    }
}
