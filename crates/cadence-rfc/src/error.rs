use thiserror::Error;

use crate::rfc::ical::core::Frequency;
use crate::rfc::ical::parse::ParseError;

/// RFC parsing and validation errors
#[derive(Error, Debug)]
pub enum RfcError {
    /// A record that cannot become a `BaseEvent`. The event is skipped.
    #[error("Malformed event {uid:?}: {reason}")]
    MalformedInput { uid: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl RfcError {
    #[must_use]
    pub fn malformed(uid: &str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            uid: uid.to_string(),
            reason: reason.into(),
        }
    }
}

pub type RfcResult<T> = std::result::Result<T, RfcError>;

/// A recurrence rule that parses but cannot be expanded as written.
///
/// The expander recovers from every variant by treating the event as
/// non-recurring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("FREQ is required")]
    MissingFrequency,

    #[error("FREQ={0} is not supported")]
    UnsupportedFrequency(Frequency),

    #[error("{0} is not supported")]
    UnsupportedPart(&'static str),

    #[error("COUNT and UNTIL are mutually exclusive")]
    CountAndUntil,

    #[error("INTERVAL must be positive")]
    ZeroInterval,

    #[error("BYSETPOS requires BYMONTH, BYDAY, BYMONTHDAY, BYHOUR, BYMINUTE or BYSECOND")]
    SetPosWithoutFilter,

    #[error("ordinal BYDAY is not allowed with FREQ={0}")]
    OrdinalOutOfContext(Frequency),

    #[error("BYMONTHDAY is not allowed with FREQ=WEEKLY")]
    MonthDayOutOfContext,

    #[error("{0} value {1} is out of range")]
    OutOfRange(&'static str, i32),
}
