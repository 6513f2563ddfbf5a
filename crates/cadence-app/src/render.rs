use std::sync::Arc;

use cadence_service::countdown::CountdownSnapshot;
use cadence_service::render::RenderPayload;

/// Logs the render payload whenever the displayed state changes.
///
/// Ticks that only move the countdown are skipped.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last: Option<Arc<CountdownSnapshot>>,
}

impl LogRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders `snapshot` if it differs from the last rendered one. Returns
    /// whether anything was emitted.
    pub fn render(&mut self, snapshot: &Arc<CountdownSnapshot>) -> bool {
        if self
            .last
            .as_ref()
            .is_some_and(|last| last.same_state(snapshot))
        {
            return false;
        }

        let payload = RenderPayload::from_snapshot(snapshot);
        match payload.to_json() {
            Ok(json) => tracing::info!(
                urgency = %snapshot.urgency,
                stale = snapshot.stale,
                payload = %json,
                "countdown changed"
            ),
            Err(error) => tracing::warn!(%error, "failed to serialize render payload"),
        }
        self.last = Some(Arc::clone(snapshot));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cadence_service::countdown::classify;
    use chrono::{TimeDelta, TimeZone, Utc};

    #[test_log::test]
    fn test_renders_only_on_change() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut renderer = LogRenderer::new();

        assert!(renderer.render(&Arc::new(classify(now, None, None))));
        let later = classify(now + TimeDelta::seconds(5), None, None);
        assert!(!renderer.render(&Arc::new(later)));

        let failing = classify(now, None, None).with_error(Some("offline".to_string()));
        assert!(renderer.render(&Arc::new(failing)));
    }
}
