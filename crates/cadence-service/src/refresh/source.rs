use std::future::Future;

use cadence_rfc::rfc::ical::parse::EventRecord;

use crate::error::SourceError;

/// Records fetched from one source calendar.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub source_id: String,
    pub records: Vec<EventRecord>,
}

impl SourceBatch {
    #[must_use]
    pub fn new(source_id: impl Into<String>, records: Vec<EventRecord>) -> Self {
        Self {
            source_id: source_id.into(),
            records,
        }
    }
}

/// Supplies parsed event records. The only step of a refresh allowed to
/// perform I/O.
pub trait EventSource: Send + Sync {
    /// ## Summary
    /// Fetches every configured calendar.
    ///
    /// ## Errors
    /// Returns `SourceError` when any calendar cannot be fetched. The whole
    /// refresh then counts as failed and the previous timeline is kept.
    fn fetch(&self) -> impl Future<Output = Result<Vec<SourceBatch>, SourceError>> + Send;
}
