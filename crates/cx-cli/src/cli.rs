//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::replay::ReplayArgs;

/// Editing session tracker.
///
/// Replays editor change and focus notifications through the session tracker,
/// scores how likely the edits were typed by a human, and keeps a history of
/// session reports per class.
#[derive(Debug, Parser)]
#[command(name = "cx", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay recorded editor notifications and report on the session.
    Replay(ReplayArgs),

    /// List stored session reports.
    Sessions {
        /// Only show sessions for this class ("all" for every class).
        #[arg(long)]
        class: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage classes and their review instructions.
    #[command(subcommand)]
    Classes(ClassesAction),

    /// Show database location and contents.
    Status,
}

/// Class management actions.
#[derive(Debug, Subcommand)]
pub enum ClassesAction {
    /// Create a class or replace its system prompt.
    Set {
        /// Class name.
        name: String,

        /// Instructions given to the reasoning service for this class's sessions.
        #[arg(long)]
        prompt: String,
    },

    /// List all classes.
    List,

    /// Show one class.
    Show {
        /// Class name.
        name: String,
    },
}
