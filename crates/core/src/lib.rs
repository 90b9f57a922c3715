//! Run execution and live-streaming engine.
//!
//! Launches stored scripts as child processes in their own process group,
//! tracks each execution in an in-memory registry, and hands the merged
//! output to observers through a per-run line queue. Nothing here knows
//! about HTTP; the API crate wraps [`runs::RunManager`].

pub mod error;
pub mod runs;
pub mod types;
