//! TZID lookup and wall-clock to instant conversion.
//!
//! Windows zone names and IANA aliases are canonicalized through ICU4X before
//! lookup in `chrono-tz`.

use cadence_core::config::TimezoneConfig;
use cadence_core::types::FoldPolicy;
use chrono::{DateTime, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use icu::time::zone::WindowsParser;
use icu::time::zone::iana::IanaParserExtended;
use std::collections::HashMap;
use std::str::FromStr;

use crate::rfc::ical::core::{DateTimeForm, EventTime, TimeValue};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Turns TZIDs into zones and wall-clock readings into instants.
///
/// Holds the zone assumed for floating and all-day values and the DST overlap
/// policy. Lookups are memoized by the raw TZID.
#[derive(Debug, Clone)]
pub struct TimeZoneResolver {
    zones: HashMap<String, Tz>,
    assumed_zone: Tz,
    fold: FoldPolicy,
}

impl TimeZoneResolver {
    /// Creates a resolver that reads floating values as UTC.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zones: HashMap::new(),
            assumed_zone: Tz::UTC,
            fold: FoldPolicy::default(),
        }
    }

    /// ## Summary
    /// Builds a resolver from the `[timezone]` settings.
    ///
    /// ## Errors
    /// Returns `ConversionError::UnknownTimezone` if `assumed_zone` does not
    /// name a known zone.
    pub fn from_config(config: &TimezoneConfig) -> Result<Self, ConversionError> {
        let mut resolver = Self::new().with_fold_policy(config.fold);
        let assumed = resolver.resolve(&config.assumed_zone)?;
        Ok(resolver.with_assumed_zone(assumed))
    }

    #[must_use]
    pub fn with_assumed_zone(mut self, zone: Tz) -> Self {
        self.assumed_zone = zone;
        self
    }

    #[must_use]
    pub fn with_fold_policy(mut self, fold: FoldPolicy) -> Self {
        self.fold = fold;
        self
    }

    /// Zone applied to floating and all-day values at comparison time.
    #[must_use]
    pub const fn assumed_zone(&self) -> Tz {
        self.assumed_zone
    }

    #[must_use]
    pub const fn fold_policy(&self) -> FoldPolicy {
        self.fold
    }

    /// ## Summary
    /// Looks up a TZID, accepting IANA names, IANA aliases, Windows names and
    /// the `/mozilla.org/` style prefixes.
    ///
    /// ## Errors
    /// Returns `ConversionError::UnknownTimezone` if no zone matches.
    pub fn resolve(&mut self, tzid: &str) -> Result<Tz, ConversionError> {
        if let Some(tz) = self.zones.get(tzid) {
            return Ok(*tz);
        }

        let tz = Tz::from_str(&canonical_name(tzid))
            .map_err(|_unknown| ConversionError::UnknownTimezone(tzid.to_string()))?;
        tracing::trace!(tzid, zone = tz.name(), "resolved timezone");
        self.zones.insert(tzid.to_string(), tz);
        Ok(tz)
    }

    /// ## Summary
    /// Classifies a parsed value, resolving its `TZID` if it has one.
    ///
    /// Floating and date values stay zone-less.
    ///
    /// ## Errors
    /// Returns `ConversionError::UnknownTimezone` if the attached TZID is not
    /// recognized. Callers decide on the fallback.
    pub fn classify(&mut self, value: &TimeValue) -> Result<EventTime, ConversionError> {
        Ok(match value {
            TimeValue::Date(date) => EventTime::Date(*date),
            TimeValue::DateTime { local, form } => match form {
                DateTimeForm::Utc => EventTime::Utc(local.and_utc()),
                DateTimeForm::Floating => EventTime::Floating(*local),
                DateTimeForm::Zoned { tzid } => EventTime::Zoned {
                    local: *local,
                    tz: self.resolve(tzid)?,
                },
            },
        })
    }

    /// The absolute instant of a resolved value.
    #[must_use]
    pub fn instant(&self, time: &EventTime) -> DateTime<Utc> {
        resolve(time, self.assumed_zone, self.fold)
    }

    /// Converts a wall-clock reading in `tz` to an instant under this
    /// resolver's fold policy.
    #[must_use]
    pub fn local_to_utc(&self, local: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
        local_to_utc(local, tz, self.fold)
    }
}

impl Default for TimeZoneResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// ## Summary
/// Resolves a time value to an absolute instant.
///
/// UTC values are already instants. Zoned values use their own zone.
/// Floating and date values are read in `assumed_zone`.
#[must_use]
pub fn resolve(time: &EventTime, assumed_zone: Tz, fold: FoldPolicy) -> DateTime<Utc> {
    match time {
        EventTime::Utc(dt) => *dt,
        EventTime::Zoned { local, tz } => local_to_utc(*local, *tz, fold),
        EventTime::Floating(_) | EventTime::Date(_) => {
            local_to_utc(time.local(), assumed_zone, fold)
        }
    }
}

/// ## Summary
/// Reads `local` on the wall clock of `tz`.
///
/// A time inside a DST gap does not exist; it resolves as if the gap had not
/// happened, using the offset in effect before the transition, which lands
/// it the gap's length later on the wall clock. A time inside a DST overlap
/// exists twice; `fold` picks which.
#[must_use]
pub fn local_to_utc(local: NaiveDateTime, tz: Tz, fold: FoldPolicy) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, later) => match fold {
            FoldPolicy::Earlier => earlier.with_timezone(&Utc),
            FoldPolicy::Later => later.with_timezone(&Utc),
        },
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(local - TimeDelta::days(1)))
                .fix();
            let shifted = local - TimeDelta::seconds(i64::from(before.local_minus_utc()));
            tracing::trace!(%local, zone = tz.name(), %shifted, "local time falls in a DST gap");
            shifted.and_utc()
        }
    }
}

/// The IANA name to look `tzid` up under.
fn canonical_name(tzid: &str) -> String {
    let bare = tzid
        .strip_prefix("/mozilla.org/")
        .or_else(|| tzid.strip_prefix("/softwarestudio.org/"))
        .unwrap_or(tzid);

    let iana = IanaParserExtended::new();

    // Outlook
    if let Some(zone) = WindowsParser::new().parse(bare, None)
        && let Some(entry) = iana.iter().find(|entry| entry.time_zone == zone)
    {
        return entry.canonical.to_string();
    }

    // Europe/Kiev -> Europe/Kyiv
    let parsed = iana.parse(bare);
    if parsed.time_zone == icu::time::TimeZone::UNKNOWN {
        bare.to_string()
    } else {
        parsed.canonical.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_resolve_accepts_client_spellings() {
        let mut resolver = TimeZoneResolver::new();
        for tzid in [
            "America/New_York",
            "US/Eastern",
            "Eastern Standard Time",
            "/mozilla.org/America/New_York",
        ] {
            assert_eq!(resolver.resolve(tzid), Ok(Tz::America__New_York), "{tzid}");
        }
        assert_eq!(resolver.zones.len(), 4);
    }

    #[test]
    fn test_resolve_unknown_timezone() {
        let mut resolver = TimeZoneResolver::new();
        assert_eq!(
            resolver.resolve("Mars/Olympus_Mons"),
            Err(ConversionError::UnknownTimezone(
                "Mars/Olympus_Mons".to_string()
            ))
        );
        assert!(resolver.zones.is_empty());
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("Pacific Standard Time"), "America/Los_Angeles");
        assert_eq!(canonical_name("Europe/Kiev"), "Europe/Kyiv");
        assert_eq!(
            canonical_name("/softwarestudio.org/Europe/Paris"),
            "Europe/Paris"
        );
    }

    #[test]
    fn test_offsets_follow_the_season() {
        let resolver = TimeZoneResolver::new();
        let winter = resolver.local_to_utc(local(2026, 1, 15, 10, 0), Tz::America__New_York);
        let summer = resolver.local_to_utc(local(2026, 7, 15, 10, 0), Tz::America__New_York);
        assert_eq!(winter, Utc.with_ymd_and_hms(2026, 1, 15, 15, 0, 0).unwrap());
        assert_eq!(summer, Utc.with_ymd_and_hms(2026, 7, 15, 14, 0, 0).unwrap());
    }

    #[test]
    fn test_gap_shifts_forward_by_gap_length() {
        // 02:30 does not exist in New York on 2026-03-08
        let utc = local_to_utc(
            local(2026, 3, 8, 2, 30),
            Tz::America__New_York,
            FoldPolicy::Earlier,
        );
        // Read with the pre-transition offset (-5): 07:30Z, which is 03:30 EDT
        assert_eq!(utc, Utc.with_ymd_and_hms(2026, 3, 8, 7, 30, 0).unwrap());
    }

    #[test]
    fn test_fold_policy_picks_instant() {
        // 01:30 happens twice in New York on 2026-11-01
        let ambiguous = local(2026, 11, 1, 1, 30);
        let earlier = local_to_utc(ambiguous, Tz::America__New_York, FoldPolicy::Earlier);
        let later = local_to_utc(ambiguous, Tz::America__New_York, FoldPolicy::Later);
        assert_eq!(earlier, Utc.with_ymd_and_hms(2026, 11, 1, 5, 30, 0).unwrap());
        assert_eq!(later, Utc.with_ymd_and_hms(2026, 11, 1, 6, 30, 0).unwrap());
    }

    #[test]
    fn test_floating_uses_assumed_zone() {
        let resolver = TimeZoneResolver::new().with_assumed_zone(Tz::Europe__Berlin);
        let floating = EventTime::Floating(local(2026, 1, 15, 10, 0));
        assert_eq!(
            resolver.instant(&floating),
            Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
        );

        let all_day = EventTime::Date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert_eq!(
            resolver.instant(&all_day),
            Utc.with_ymd_and_hms(2026, 1, 14, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_classify_keeps_floating() {
        let mut resolver = TimeZoneResolver::new();
        let value = TimeValue::DateTime {
            local: local(2026, 1, 15, 10, 0),
            form: DateTimeForm::Floating,
        };
        assert_eq!(
            resolver.classify(&value).unwrap(),
            EventTime::Floating(local(2026, 1, 15, 10, 0))
        );

        let zoned = TimeValue::DateTime {
            local: local(2026, 1, 15, 10, 0),
            form: DateTimeForm::Zoned {
                tzid: "W. Europe Standard Time".to_string(),
            },
        };
        assert_eq!(
            resolver.classify(&zoned).unwrap(),
            EventTime::Zoned {
                local: local(2026, 1, 15, 10, 0),
                tz: Tz::Europe__Berlin,
            }
        );
    }

    #[test]
    fn test_from_config_resolves_assumed_zone() {
        let config = TimezoneConfig {
            assumed_zone: "Europe/London".to_string(),
            fold: FoldPolicy::Later,
        };
        let resolver = TimeZoneResolver::from_config(&config).unwrap();
        assert_eq!(resolver.assumed_zone(), Tz::Europe__London);
        assert_eq!(resolver.fold_policy(), FoldPolicy::Later);

        let config = TimezoneConfig {
            assumed_zone: "Nowhere/Special".to_string(),
            fold: FoldPolicy::Earlier,
        };
        assert!(TimeZoneResolver::from_config(&config).is_err());
    }
}
