//! Recurrence expansion for iCalendar events.
//!
//! This module provides functionality to expand recurring calendar events
//! according to RFC 5545 recurrence rules (RRULE), bounded by a [`Horizon`].

mod expander;
mod timezone;

pub use expander::{
    DEFAULT_LOOKBACK_HOURS, DEFAULT_MAX_INSTANCES, DEFAULT_WINDOW_DAYS, Expansion,
    ExpansionWarning, Horizon, RecurrenceExpander,
};
pub use timezone::{ConversionError, TimeZoneResolver, local_to_utc, resolve};
