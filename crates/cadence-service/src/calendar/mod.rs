//! Merged timeline of occurrences and current/next selection.

mod select;
mod timeline;

pub use select::{HidePredicate, Selection, SelectionFilter, select};
pub use timeline::{EventTimeline, TimelineEntry};
