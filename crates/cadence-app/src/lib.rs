//! Glue for the `cadence` binary: a JSON file event source and a renderer
//! that logs countdown changes.

pub mod render;
pub mod source;
