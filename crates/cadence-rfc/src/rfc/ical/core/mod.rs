//! Core value and event types.

mod event;
mod rrule;
mod time;

pub use event::{
    BaseEvent, BusyStatus, EventDetails, EventExtensions, EventSpan, EventStatus, Occurrence,
    Transparency,
};
pub use rrule::{Frequency, RRule, RRuleUntil, Weekday, WeekdayNum};
pub use time::{DateTimeForm, EventTime, TimeForm, TimeValue};
