//! Errors raised while reading property values.

pub type ParseResult<T> = Result<T, ParseError>;

/// A value that could not be read, with where in it the problem was found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at offset {offset}{}", self.context.as_deref().map(|c| format!(": {c}")).unwrap_or_default())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// 0-based byte offset into the value.
    pub offset: usize,
    /// The offending input, or the part of it that failed.
    pub context: Option<String>,
}

impl ParseError {
    #[must_use]
    pub fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("invalid DATE")]
    InvalidDate,
    #[error("invalid TIME")]
    InvalidTime,
    #[error("invalid DATE-TIME")]
    InvalidDateTime,
    #[error("invalid DURATION")]
    InvalidDuration,
    #[error("invalid RRULE")]
    InvalidRRule,
    #[error("unknown FREQ")]
    InvalidFrequency,
    #[error("invalid weekday")]
    InvalidWeekday,
    #[error("invalid integer")]
    InvalidInteger,
    #[error("invalid BOOLEAN")]
    InvalidBoolean,
}
