//! Command-line interface for inspecting a cache root

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
