//! RFC 5545 value types, ingestion of parsed event records, timezone
//! resolution and recurrence expansion.

pub mod error;
pub mod rfc;
