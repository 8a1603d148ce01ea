//! Tunable thresholds for tracking and scoring.
//!
//! Both structs deserialize with per-field defaults so a config file only needs
//! to name the values it overrides.

use serde::{Deserialize, Serialize};

/// Configuration for event ingestion and activity classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Gaps at or above this are counted as inactive time.
    /// Default: 30000 (30 seconds).
    pub idle_threshold_ms: u64,

    /// Single-change insertions longer than this are flagged as external pastes.
    /// Default: 20.
    pub paste_threshold_chars: u64,

    /// Smallest single-change insertion recorded as a paste candidate at all.
    /// Default: 2 (one character is an ordinary keystroke).
    pub paste_min_chars: u64,

    /// Capacity of the ingestion channel between editor callbacks and the tracker task.
    pub channel_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            idle_threshold_ms: 30_000, // 30 seconds
            paste_threshold_chars: 20,
            paste_min_chars: 2,
            channel_capacity: 1024,
        }
    }
}

/// Weights for the rule-based likelihood score.
///
/// Scores are integers in `0..=100`; every adjustment is applied to the
/// baseline and the total is clamped at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Neutral starting score.
    pub baseline: i64,

    /// Score returned when no edits were recorded.
    pub insufficient_data_score: u8,

    /// Points removed at a 100% external-paste ratio (scaled linearly).
    pub paste_penalty: f64,

    /// Characters per active second above which typing is considered implausibly fast.
    pub max_human_chars_per_sec: f64,

    /// Points removed when the typing speed exceeds `max_human_chars_per_sec`.
    pub speed_penalty: i64,

    /// Points added when focus was lost at least once while edits were flowing.
    pub focus_loss_bonus: i64,

    /// Points added when deletions make up a meaningful share of the volume.
    pub revision_bonus: i64,

    /// Deleted/inserted ratio that earns `revision_bonus`.
    pub revision_ratio: f64,

    /// Points added for sessions that accumulated a steady amount of active time.
    pub sustained_activity_bonus: i64,

    /// Active time needed to earn `sustained_activity_bonus`.
    pub sustained_activity_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            baseline: 70,
            insufficient_data_score: 50,
            paste_penalty: 60.0,
            max_human_chars_per_sec: 15.0,
            speed_penalty: 20,
            focus_loss_bonus: 5,
            revision_bonus: 10,
            revision_ratio: 0.1,
            sustained_activity_bonus: 5,
            sustained_activity_ms: 5 * 60_000, // 5 minutes
        }
    }
}
