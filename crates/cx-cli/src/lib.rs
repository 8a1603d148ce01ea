//! Cognix CLI library.
//!
//! This crate provides the CLI interface for replaying editing sessions,
//! scoring them, and browsing stored reports per class.

mod cli;
pub mod commands;
mod config;
pub mod report;

pub use cli::{ClassesAction, Cli, Commands};
pub use config::Config;
