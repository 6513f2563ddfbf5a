//! Timeline, selection, countdown classification and the dual-cadence
//! refresh loop built on top of `cadence-rfc` expansion.

pub mod calendar;
pub mod countdown;
pub mod error;
pub mod refresh;
pub mod render;
