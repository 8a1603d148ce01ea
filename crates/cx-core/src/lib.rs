//! Core domain logic for editing session telemetry.
//!
//! This crate contains:
//! - Classification: turning editor change notifications into edit and paste events
//! - Session tracking: the append-only session log, focus filtering, and the ingestion channel
//! - Activity timing and stats snapshots
//! - Likelihood analysis: rule-based scoring with optional external refinement

pub mod activity;
pub mod analysis;
pub mod classify;
mod config;
pub mod event;
pub mod focus;
pub mod session;
pub mod stats;
pub mod tracker;

pub use analysis::{
    Analyzer, HumanLikelihoodAnalysis, ReasoningError, ReasoningService, Refinement,
    RefinementRequest, RulesOnly, ScoreBand, score_rules, summarize,
};
pub use config::{ScoringConfig, TrackerConfig};
pub use event::{ChangeNotification, ContentChange, EditEvent, FocusEvent, PasteEvent};
pub use session::{Session, UserDetails};
pub use stats::{SessionStats, compute_stats};
pub use tracker::{SessionTracker, TrackerError, TrackerHandle, spawn_tracker};
pub use tokio_util::sync::CancellationToken;
