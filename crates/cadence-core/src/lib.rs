//! Shared configuration, error and clock primitives for the cadence workspace.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;
