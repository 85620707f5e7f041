//! stepcache - checkpoint cache for multi-step pipelines
//!
//! Persists the result of each pipeline step under a key derived from the
//! step's identity and arguments, so re-running a pipeline only recomputes
//! the steps whose inputs changed. A manifest records execution order so a
//! step and everything after it can be invalidated together.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod ui;

pub use cache::{CallArgs, Checkpoint, CheckpointCache};
pub use error::{StepCacheError, StepCacheResult};
