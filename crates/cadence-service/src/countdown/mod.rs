//! Pure urgency classification, recomputed on every fast tick.

mod snapshot;
mod state;

pub use snapshot::CountdownSnapshot;
pub use state::{Urgency, UrgencyThresholds, classify, classify_with, gap_seconds};
