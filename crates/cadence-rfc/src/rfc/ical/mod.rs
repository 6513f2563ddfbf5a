//! iCalendar (RFC 5545) support restricted to VEVENT recurrence.

pub mod core;
pub mod expand;
pub mod parse;
