//! Recurrence expansion algorithm (RFC 5545 §3.3.10).
//!
//! Candidates are generated on the wall clock of the event's start value,
//! so a 09:00 meeting in a named zone stays at 09:00 across DST transitions.
//! Every expansion is bounded by a [`Horizon`] regardless of what the rule
//! itself specifies.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use cadence_core::config::ExpansionConfig;
use cadence_core::types::UntilBoundary;
use chrono::{
    DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike,
    Utc,
};

use super::timezone::TimeZoneResolver;
use crate::error::RuleError;
use crate::rfc::ical::core::{
    BaseEvent, EventDetails, EventSpan, EventTime, Frequency, Occurrence, RRule, RRuleUntil,
    TimeForm, Weekday, WeekdayNum,
};

/// Default ceiling on occurrences per event.
pub const DEFAULT_MAX_INSTANCES: usize = 1000;

/// Default window length after "now".
pub const DEFAULT_WINDOW_DAYS: i64 = 730;

/// Default look-back before "now" for instances still worth materializing.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Periods starting this far past the window end stop generation even if
/// they produced no candidate.
const WINDOW_SLACK_DAYS: i64 = 2;

/// ## Summary
/// Bounds applied to every expansion, independent of the rule's own COUNT
/// and UNTIL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    /// Most occurrences returned for one event.
    pub max_instances: usize,
    /// Recurrence instances that end at or before this instant are not
    /// materialized. They still consume COUNT.
    pub range_start: Option<DateTime<Utc>>,
    /// Generation stops at the first candidate starting at or after this.
    pub range_end: DateTime<Utc>,
    /// Whether an instance starting exactly at UNTIL is kept.
    pub until_boundary: UntilBoundary,
}

impl Horizon {
    /// The default horizon around `now`.
    #[must_use]
    pub fn from_now(now: DateTime<Utc>) -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            range_start: lookback(now, DEFAULT_LOOKBACK_HOURS),
            range_end: window_end(now, DEFAULT_WINDOW_DAYS),
            until_boundary: UntilBoundary::default(),
        }
    }

    /// The configured horizon around `now`.
    #[must_use]
    pub fn from_config(now: DateTime<Utc>, config: &ExpansionConfig) -> Self {
        Self {
            max_instances: config.max_instances,
            range_start: lookback(now, config.lookback_hours),
            range_end: window_end(now, config.window_days),
            until_boundary: config.until_boundary,
        }
    }

    #[must_use]
    pub const fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    #[must_use]
    pub const fn with_range_start(mut self, range_start: Option<DateTime<Utc>>) -> Self {
        self.range_start = range_start;
        self
    }

    #[must_use]
    pub const fn with_range_end(mut self, range_end: DateTime<Utc>) -> Self {
        self.range_end = range_end;
        self
    }

    #[must_use]
    pub const fn with_until_boundary(mut self, until_boundary: UntilBoundary) -> Self {
        self.until_boundary = until_boundary;
        self
    }
}

fn lookback(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_hours(hours).and_then(|delta| now.checked_sub_signed(delta))
}

fn window_end(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(days)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Something the expander recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionWarning {
    /// The rule was ignored and the event expanded to its first instance.
    InvalidRule { uid: String, error: RuleError },
}

impl fmt::Display for ExpansionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRule { uid, error } => {
                write!(f, "event {uid}: {error}; treated as non-recurring")
            }
        }
    }
}

/// Result of expanding one or more events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Sorted by instant within each event.
    pub occurrences: Vec<Occurrence>,
    /// Set when a horizon bound, not the rule, ended generation.
    pub truncated: bool,
    pub warnings: Vec<ExpansionWarning>,
}

impl Expansion {
    fn single(occurrence: Occurrence) -> Self {
        Self {
            occurrences: vec![occurrence],
            ..Self::default()
        }
    }

    /// Appends another expansion.
    pub fn extend(&mut self, other: Self) {
        self.occurrences.extend(other.occurrences);
        self.truncated |= other.truncated;
        self.warnings.extend(other.warnings);
    }
}

/// How far an occurrence's end lies from its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
    /// Nominal days, for all-day events.
    Days(i64),
    /// Exact elapsed time.
    Exact(TimeDelta),
}

impl Length {
    fn delta(self) -> TimeDelta {
        match self {
            Self::Days(days) => TimeDelta::try_days(days).unwrap_or_default(),
            Self::Exact(delta) => delta,
        }
    }

    fn days(self) -> i64 {
        match self {
            Self::Days(days) => days,
            Self::Exact(delta) => delta.num_days(),
        }
    }
}

/// ## Summary
/// Expands base events into concrete occurrences.
///
/// Expansion never fails: an invalid rule degrades to a single occurrence
/// and is reported through [`Expansion::warnings`].
pub struct RecurrenceExpander<'a> {
    resolver: &'a TimeZoneResolver,
}

impl<'a> RecurrenceExpander<'a> {
    /// Creates a new recurrence expander.
    #[must_use]
    pub const fn new(resolver: &'a TimeZoneResolver) -> Self {
        Self { resolver }
    }

    /// ## Summary
    /// Expands one event within `horizon`.
    ///
    /// - An override (RECURRENCE-ID set) yields exactly itself.
    /// - An event without a rule yields exactly one occurrence.
    /// - Otherwise DTSTART comes first, followed by the rule's instances up
    ///   to COUNT, UNTIL or the horizon, whichever ends first. EXDATEs are
    ///   removed, RDATEs inside the window are added, and the result is
    ///   sorted and deduplicated by instant.
    #[must_use]
    pub fn expand(&self, event: &BaseEvent, horizon: &Horizon) -> Expansion {
        let length = self.length(event);

        if let Some(instance) = event.recurrence_id {
            return Expansion::single(self.occurrence(
                &event.details,
                event.start,
                instance,
                length,
                true,
            ));
        }

        let single = || self.occurrence(&event.details, event.start, event.start, length, false);

        let Some(rule) = &event.rrule else {
            return Expansion::single(single());
        };

        let freq = match rule.validate() {
            Ok(freq) => freq,
            Err(error) => {
                tracing::warn!(
                    uid = %event.uid(),
                    rule = %rule,
                    %error,
                    "invalid recurrence rule, expanding as a single occurrence"
                );
                return Expansion {
                    occurrences: vec![single()],
                    truncated: false,
                    warnings: vec![ExpansionWarning::InvalidRule {
                        uid: event.uid().to_string(),
                        error,
                    }],
                };
            }
        };

        let (generated, mut truncated) = self.generate(event, rule, freq, horizon, length);

        let mut starts = generated;
        starts.extend(
            event
                .rdates
                .iter()
                .filter(|rdate| self.within(rdate, length, horizon))
                .copied(),
        );
        self.remove_exdates(event, &mut starts);

        starts.sort_by_key(|start| self.resolver.instant(start));
        starts.dedup_by_key(|start| self.resolver.instant(start));
        if starts.len() > horizon.max_instances {
            starts.truncate(horizon.max_instances);
            truncated = true;
        }

        let occurrences: Vec<Occurrence> = starts
            .into_iter()
            .map(|start| self.occurrence(&event.details, start, start, length, false))
            .collect();

        tracing::debug!(
            uid = %event.uid(),
            rule = %rule,
            count = occurrences.len(),
            truncated,
            "expanded recurring event"
        );

        Expansion {
            occurrences,
            truncated,
            warnings: Vec::new(),
        }
    }

    /// Expands every event and concatenates the results.
    #[must_use]
    pub fn expand_all<'e>(
        &self,
        events: impl IntoIterator<Item = &'e BaseEvent>,
        horizon: &Horizon,
    ) -> Expansion {
        let mut expansion = Expansion::default();
        for event in events {
            expansion.extend(self.expand(event, horizon));
        }
        expansion
    }

    fn length(&self, event: &BaseEvent) -> Length {
        match (event.start, event.span) {
            (EventTime::Date(start), EventSpan::End(end)) => {
                Length::Days((end.date() - start).num_days())
            }
            (EventTime::Date(_), EventSpan::Duration(delta)) => Length::Days(delta.num_days()),
            (start, EventSpan::End(end)) => {
                Length::Exact(self.resolver.instant(&end) - self.resolver.instant(&start))
            }
            (_, EventSpan::Duration(delta)) => Length::Exact(delta),
        }
    }

    fn occurrence(
        &self,
        details: &Arc<EventDetails>,
        start: EventTime,
        instance: EventTime,
        length: Length,
        is_override: bool,
    ) -> Occurrence {
        Occurrence {
            details: Arc::clone(details),
            start,
            end: end_time(self.resolver, &start, length),
            instance,
            is_override,
        }
    }

    fn within(&self, start: &EventTime, length: Length, horizon: &Horizon) -> bool {
        let from = self.resolver.instant(start);
        let to = self.resolver.instant(&end_time(self.resolver, start, length));
        from < horizon.range_end
            && horizon
                .range_start
                .is_none_or(|range_start| to > range_start || from >= range_start)
    }

    /// Removes EXDATE matches. DATE-valued exclusions remove every candidate
    /// on that local date; the rest compare as instants.
    fn remove_exdates(&self, event: &BaseEvent, starts: &mut Vec<EventTime>) {
        if event.exdates.is_empty() {
            return;
        }
        let mut instants = HashSet::new();
        let mut dates = HashSet::new();
        for exdate in &event.exdates {
            if let EventTime::Date(date) = exdate {
                dates.insert(*date);
            } else {
                instants.insert(self.resolver.instant(exdate));
            }
        }

        let before = starts.len();
        starts.retain(|start| {
            !(dates.contains(&start.date()) || instants.contains(&self.resolver.instant(start)))
        });
        tracing::trace!(
            uid = %event.uid(),
            removed = before - starts.len(),
            "applied EXDATE"
        );
    }

    /// Walks the rule period by period. Returns the accepted starts and
    /// whether the horizon cut generation short.
    fn generate(
        &self,
        event: &BaseEvent,
        rule: &RRule,
        freq: Frequency,
        horizon: &Horizon,
        length: Length,
    ) -> (Vec<EventTime>, bool) {
        let form = event.start.form();
        let anchor = event.start.local();
        let mut walk = Walk {
            resolver: self.resolver,
            horizon,
            form,
            length,
            count: rule.count,
            until: rule
                .until
                .map(|until| UntilBound::new(until, form, self.resolver)),
            taken: 0,
            starts: Vec::new(),
        };

        // DTSTART is always the first instance, whether or not it matches
        // the rule's filters.
        match walk.offer(anchor, true) {
            Step::Continue => {}
            Step::Done => return walk.finish(false),
            Step::Truncated => return walk.finish(true),
        }

        let times = time_set(rule, anchor.time(), form);
        let limit = horizon
            .range_end
            .checked_add_signed(TimeDelta::days(WINDOW_SLACK_DAYS))
            .unwrap_or(horizon.range_end);

        let mut index = first_useful_index(rule, freq, anchor.date(), horizon, length);
        loop {
            let period = index
                .checked_mul(rule.interval())
                .and_then(|step| Period::nth(freq, anchor.date(), rule.week_start(), step));
            let Some(period) = period else {
                return walk.finish(true);
            };

            let floor = period.first_day();
            let floor_instant = self
                .resolver
                .instant(&form.at(floor.and_time(NaiveTime::MIN)));
            if walk
                .until
                .is_some_and(|until| until.passed(floor, floor_instant))
            {
                return walk.finish(false);
            }
            if floor_instant > limit {
                return walk.finish(true);
            }

            let mut candidates: Vec<NaiveDateTime> = period
                .dates(rule, anchor.date())
                .into_iter()
                .flat_map(|date| times.iter().map(move |time| date.and_time(*time)))
                .collect();
            candidates.sort_unstable();
            candidates.dedup();

            for candidate in select_positions(candidates, &rule.by_setpos)
                .into_iter()
                .filter(|candidate| *candidate > anchor)
            {
                match walk.offer(candidate, false) {
                    Step::Continue => {}
                    Step::Done => return walk.finish(false),
                    Step::Truncated => return walk.finish(true),
                }
            }

            let Some(next) = index.checked_add(1) else {
                return walk.finish(true);
            };
            index = next;
        }
    }
}

/// Index of the first period that can hold an instance ending after the
/// window opens. A rule with COUNT has to walk from DTSTART to count every
/// slot, so it always starts at zero.
fn first_useful_index(
    rule: &RRule,
    freq: Frequency,
    anchor: NaiveDate,
    horizon: &Horizon,
    length: Length,
) -> u32 {
    let Some(range_start) = horizon.range_start else {
        return 0;
    };
    if rule.count.is_some() {
        return 0;
    }
    let Some(skip) = range_start
        .checked_sub_signed(length.delta())
        .and_then(|at| at.checked_sub_signed(TimeDelta::days(WINDOW_SLACK_DAYS)))
        .map(|at| at.date_naive())
    else {
        return 0;
    };
    if skip <= anchor {
        return 0;
    }

    let units = match freq {
        Frequency::Daily => (skip - anchor).num_days(),
        Frequency::Weekly => (skip - anchor).num_weeks(),
        Frequency::Monthly => {
            i64::from(skip.year() - anchor.year()) * 12 + i64::from(skip.month())
                - i64::from(anchor.month())
        }
        Frequency::Yearly => i64::from(skip.year() - anchor.year()),
        Frequency::Secondly | Frequency::Minutely | Frequency::Hourly => 0,
    };
    u32::try_from(units).map_or(0, |units| units / rule.interval())
}

fn end_time(resolver: &TimeZoneResolver, start: &EventTime, length: Length) -> EventTime {
    match *start {
        EventTime::Date(date) => EventTime::Date(
            TimeDelta::try_days(length.days())
                .and_then(|delta| date.checked_add_signed(delta))
                .unwrap_or(date),
        ),
        EventTime::Floating(local) => {
            EventTime::Floating(local.checked_add_signed(length.delta()).unwrap_or(local))
        }
        EventTime::Utc(instant) => {
            EventTime::Utc(instant.checked_add_signed(length.delta()).unwrap_or(instant))
        }
        EventTime::Zoned { local, tz } => {
            let begin = resolver.local_to_utc(local, tz);
            let end = begin.checked_add_signed(length.delta()).unwrap_or(begin);
            EventTime::Zoned {
                local: end.with_timezone(&tz).naive_local(),
                tz,
            }
        }
    }
}

enum Step {
    Continue,
    /// The rule itself is exhausted.
    Done,
    /// A horizon bound was hit.
    Truncated,
}

/// COUNT, UNTIL and horizon bookkeeping for one expansion.
struct Walk<'w> {
    resolver: &'w TimeZoneResolver,
    horizon: &'w Horizon,
    form: TimeForm,
    length: Length,
    count: Option<u32>,
    until: Option<UntilBound>,
    /// COUNT slots consumed, including instances before the window.
    taken: u32,
    starts: Vec<EventTime>,
}

impl Walk<'_> {
    fn offer(&mut self, local: NaiveDateTime, is_anchor: bool) -> Step {
        if self.count_reached() {
            return Step::Done;
        }

        let start = self.form.at(local);
        let instant = self.resolver.instant(&start);
        if !is_anchor
            && self.until.is_some_and(|until| {
                !until.admits(local, instant, self.horizon.until_boundary)
            })
        {
            return Step::Done;
        }
        if instant >= self.horizon.range_end || self.starts.len() >= self.horizon.max_instances {
            return Step::Truncated;
        }

        self.taken = self.taken.saturating_add(1);
        let end = self
            .resolver
            .instant(&end_time(self.resolver, &start, self.length));
        let before_window = self
            .horizon
            .range_start
            .is_some_and(|range_start| end <= range_start && instant < range_start);
        if before_window {
            tracing::trace!(%start, "instance ends before the window");
        } else {
            self.starts.push(start);
        }

        if self.count_reached() {
            Step::Done
        } else {
            Step::Continue
        }
    }

    fn count_reached(&self) -> bool {
        self.count.is_some_and(|count| self.taken >= count)
    }

    fn finish(self, truncated: bool) -> (Vec<EventTime>, bool) {
        (self.starts, truncated)
    }
}

/// UNTIL, normalized for comparison against candidates.
#[derive(Debug, Clone, Copy)]
enum UntilBound {
    /// Compared by the candidate's local date.
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

impl UntilBound {
    fn new(until: RRuleUntil, form: TimeForm, resolver: &TimeZoneResolver) -> Self {
        match until {
            RRuleUntil::Date(date) => Self::Date(date),
            RRuleUntil::DateTime { local, utc: true } => Self::Instant(local.and_utc()),
            // A local UNTIL is read in the start value's own frame.
            RRuleUntil::DateTime { local, utc: false } => {
                Self::Instant(resolver.instant(&form.at(local)))
            }
        }
    }

    fn admits(self, local: NaiveDateTime, instant: DateTime<Utc>, boundary: UntilBoundary) -> bool {
        match (self, boundary) {
            (Self::Date(date), UntilBoundary::Inclusive) => local.date() <= date,
            (Self::Date(date), UntilBoundary::Exclusive) => local.date() < date,
            (Self::Instant(until), UntilBoundary::Inclusive) => instant <= until,
            (Self::Instant(until), UntilBoundary::Exclusive) => instant < until,
        }
    }

    fn passed(self, floor: NaiveDate, floor_instant: DateTime<Utc>) -> bool {
        match self {
            Self::Date(date) => floor > date,
            Self::Instant(until) => floor_instant > until,
        }
    }
}

/// One step of the rule's frequency.
#[derive(Debug, Clone, Copy)]
enum Period {
    Day(NaiveDate),
    /// First day of the week (per WKST).
    Week(NaiveDate),
    /// First day of the month.
    Month(NaiveDate),
    /// January 1st.
    Year(NaiveDate),
}

impl Period {
    /// The period `step` frequency units after the one holding `anchor`.
    fn nth(freq: Frequency, anchor: NaiveDate, wkst: Weekday, step: u32) -> Option<Self> {
        Some(match freq {
            Frequency::Daily => Self::Day(anchor.checked_add_days(Days::new(u64::from(step)))?),
            Frequency::Weekly => {
                let offset = (7 + anchor.weekday().num_days_from_monday()
                    - wkst.to_chrono().num_days_from_monday())
                    % 7;
                let week = anchor.checked_sub_days(Days::new(u64::from(offset)))?;
                Self::Week(week.checked_add_days(Days::new(u64::from(step) * 7))?)
            }
            Frequency::Monthly => Self::Month(
                anchor
                    .with_day(1)?
                    .checked_add_months(Months::new(step))?,
            ),
            Frequency::Yearly => {
                let year = anchor.year().checked_add(i32::try_from(step).ok()?)?;
                Self::Year(NaiveDate::from_ymd_opt(year, 1, 1)?)
            }
            Frequency::Secondly | Frequency::Minutely | Frequency::Hourly => return None,
        })
    }

    const fn first_day(self) -> NaiveDate {
        match self {
            Self::Day(date) | Self::Week(date) | Self::Month(date) | Self::Year(date) => date,
        }
    }

    /// Candidate dates within this period, ascending.
    fn dates(self, rule: &RRule, anchor: NaiveDate) -> Vec<NaiveDate> {
        match self {
            Self::Day(day) => {
                if day_matches(rule, day) {
                    vec![day]
                } else {
                    Vec::new()
                }
            }
            Self::Week(first) => {
                let weekdays: Vec<chrono::Weekday> = if rule.by_day.is_empty() {
                    vec![anchor.weekday()]
                } else {
                    rule.by_day.iter().map(|wd| wd.weekday.to_chrono()).collect()
                };
                first
                    .iter_days()
                    .take(7)
                    .filter(|day| weekdays.contains(&day.weekday()) && month_allowed(rule, *day))
                    .collect()
            }
            Self::Month(first) => {
                if month_allowed(rule, first) {
                    month_dates(rule, first, anchor)
                } else {
                    Vec::new()
                }
            }
            Self::Year(first) => year_dates(rule, first, anchor),
        }
    }
}

fn month_allowed(rule: &RRule, date: NaiveDate) -> bool {
    rule.by_month.is_empty()
        || rule
            .by_month
            .iter()
            .any(|month| u32::from(*month) == date.month())
}

/// `BYxxx` parts act as filters on a daily rule.
fn day_matches(rule: &RRule, day: NaiveDate) -> bool {
    let last = days_in_month(day);
    month_allowed(rule, day)
        && (rule.by_monthday.is_empty()
            || rule
                .by_monthday
                .iter()
                .any(|value| resolve_monthday(*value, last) == Some(day.day())))
        && (rule.by_day.is_empty()
            || rule
                .by_day
                .iter()
                .any(|wd| wd.weekday.to_chrono() == day.weekday()))
}

fn days_in_month(date: NaiveDate) -> u32 {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .map_or(31, |last| last.day())
}

/// Maps a BYMONTHDAY value to a day of a month with `last` days. Negative
/// values count from the end; values the month does not have yield `None`.
fn resolve_monthday(value: i8, last: u32) -> Option<u32> {
    let magnitude = u32::from(value.unsigned_abs());
    if magnitude == 0 || magnitude > last {
        return None;
    }
    Some(if value > 0 { magnitude } else { last + 1 - magnitude })
}

/// Picks by signed position: 1 is the first, -1 the last.
fn pick<T: Copy>(items: &[T], position: i32) -> Option<T> {
    let magnitude = usize::try_from(position.unsigned_abs()).ok()?;
    let index = if position > 0 {
        magnitude.checked_sub(1)?
    } else {
        items.len().checked_sub(magnitude)?
    };
    items.get(index).copied()
}

/// BYDAY against a span of dates. Ordinals count within the span.
fn weekday_matches(by_day: &[WeekdayNum], span: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    for wd in by_day {
        let weekday = wd.weekday.to_chrono();
        let matching: Vec<NaiveDate> = span
            .iter()
            .copied()
            .filter(|day| day.weekday() == weekday)
            .collect();
        match wd.ordinal {
            None => out.extend(matching),
            Some(ordinal) => out.extend(pick(&matching, i32::from(ordinal))),
        }
    }
    out
}

fn month_dates(rule: &RRule, first: NaiveDate, anchor: NaiveDate) -> Vec<NaiveDate> {
    let last = days_in_month(first);

    let by_monthday: Option<Vec<u32>> = (!rule.by_monthday.is_empty()).then(|| {
        rule.by_monthday
            .iter()
            .filter_map(|value| resolve_monthday(*value, last))
            .collect()
    });
    let by_day: Option<Vec<u32>> = (!rule.by_day.is_empty()).then(|| {
        let span: Vec<NaiveDate> = first
            .iter_days()
            .take_while(|day| day.month() == first.month())
            .collect();
        weekday_matches(&rule.by_day, &span)
            .into_iter()
            .map(|day| day.day())
            .collect()
    });

    let mut days: Vec<u32> = match (by_monthday, by_day) {
        (Some(monthdays), Some(weekdays)) => weekdays
            .into_iter()
            .filter(|day| monthdays.contains(day))
            .collect(),
        (Some(days), None) | (None, Some(days)) => days,
        (None, None) => Some(anchor.day())
            .filter(|day| *day <= last)
            .into_iter()
            .collect(),
    };
    days.sort_unstable();
    days.dedup();

    days.into_iter()
        .filter_map(|day| first.with_day(day))
        .collect()
}

fn year_dates(rule: &RRule, first: NaiveDate, anchor: NaiveDate) -> Vec<NaiveDate> {
    // BYDAY alone on a yearly rule: ordinals count within the year.
    if !rule.by_day.is_empty() && rule.by_month.is_empty() && rule.by_monthday.is_empty() {
        let span: Vec<NaiveDate> = first
            .iter_days()
            .take_while(|day| day.year() == first.year())
            .collect();
        let mut dates = weekday_matches(&rule.by_day, &span);
        dates.sort_unstable();
        dates.dedup();
        return dates;
    }

    let mut months: Vec<u32> = if !rule.by_month.is_empty() {
        rule.by_month.iter().copied().map(u32::from).collect()
    } else if !rule.by_monthday.is_empty() || !rule.by_day.is_empty() {
        (1..=12).collect()
    } else {
        vec![anchor.month()]
    };
    months.sort_unstable();
    months.dedup();

    months
        .into_iter()
        .filter_map(|month| first.with_month(month))
        .flat_map(|month_first| month_dates(rule, month_first, anchor))
        .collect()
}

/// Times of day for each candidate date: the BYHOUR × BYMINUTE × BYSECOND
/// product, each part defaulting to DTSTART's. All-day events use midnight.
fn time_set(rule: &RRule, anchor: NaiveTime, form: TimeForm) -> Vec<NaiveTime> {
    if form.is_all_day() {
        return vec![NaiveTime::MIN];
    }

    let part = |values: &[u8], default: u32| -> Vec<u32> {
        if values.is_empty() {
            vec![default]
        } else {
            values.iter().copied().map(u32::from).collect()
        }
    };
    let hours = part(rule.by_hour.as_slice(), anchor.hour());
    let minutes = part(rule.by_minute.as_slice(), anchor.minute());
    let seconds = part(rule.by_second.as_slice(), anchor.second());

    let mut times = Vec::with_capacity(hours.len() * minutes.len() * seconds.len());
    for hour in &hours {
        for minute in &minutes {
            for second in &seconds {
                times.extend(NaiveTime::from_hms_opt(*hour, *minute, (*second).min(59)));
            }
        }
    }
    times.sort_unstable();
    times.dedup();
    times
}

/// Applies BYSETPOS to one period's sorted candidates.
fn select_positions<T: Copy + Ord>(candidates: Vec<T>, by_setpos: &[i16]) -> Vec<T> {
    if by_setpos.is_empty() {
        return candidates;
    }
    let mut picked: Vec<T> = by_setpos
        .iter()
        .filter_map(|position| pick(&candidates, i32::from(*position)))
        .collect();
    picked.sort_unstable();
    picked.dedup();
    picked
}

#[cfg(test)]
#[path = "expander_tests.rs"]
mod tests;
