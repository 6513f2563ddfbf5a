//! Value parsers and record ingestion.

mod error;
mod event;
mod values;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use event::{EventRecord, IngestReport, IngestWarning, TimeProperty, ingest};
pub use values::{
    parse_boolean, parse_date, parse_date_or_datetime, parse_datetime, parse_duration,
    parse_rrule, parse_time,
};
