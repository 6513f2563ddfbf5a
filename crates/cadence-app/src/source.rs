use std::path::PathBuf;

use cadence_core::config::SourceConfig;
use cadence_rfc::rfc::ical::parse::EventRecord;
use cadence_service::error::SourceError;
use cadence_service::refresh::{EventSource, SourceBatch};

/// Reads each configured calendar from a JSON file holding an array of
/// event records.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    sources: Vec<(String, PathBuf)>,
}

impl JsonFileSource {
    #[must_use]
    pub fn new(sources: &[SourceConfig]) -> Self {
        Self {
            sources: sources
                .iter()
                .map(|source| (source.id.clone(), PathBuf::from(&source.path)))
                .collect(),
        }
    }
}

impl EventSource for JsonFileSource {
    async fn fetch(&self) -> Result<Vec<SourceBatch>, SourceError> {
        let mut batches = Vec::with_capacity(self.sources.len());
        for (id, path) in &self.sources {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|error| SourceError::Unavailable {
                    id: id.clone(),
                    reason: format!("{}: {error}", path.display()),
                })?;
            let records: Vec<EventRecord> =
                serde_json::from_str(&text).map_err(|error| SourceError::Decode {
                    id: id.clone(),
                    reason: error.to_string(),
                })?;
            tracing::trace!(source = %id, records = records.len(), "read source file");
            batches.push(SourceBatch::new(id.clone(), records));
        }
        Ok(batches)
    }
}
