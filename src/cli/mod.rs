//! Command-line interface for bgbatch
//!
//! Provides the `serve` (relay) and `run` (batch processing) subcommands.

mod main_impl;

pub use main_impl::{main, Cli, Command};
