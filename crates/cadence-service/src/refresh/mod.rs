//! The slow refresh cycle and the fast tick that drives the countdown.

mod backoff;
mod pipeline;
mod scheduler;
mod source;
mod state;

pub use backoff::BackoffPolicy;
pub use pipeline::{RefreshOutcome, RefreshPipeline};
pub use scheduler::{DualCadenceScheduler, SchedulerConfig, SchedulerHandle, TickPolicy};
pub use source::{EventSource, SourceBatch};
pub use state::RefreshState;
