//! Human-likelihood analysis.
//!
//! Analysis runs in two phases. [`score_rules`] is deterministic and always
//! produces a result. An optional [`ReasoningService`] may then replace that
//! result wholesale; if it fails, times out, or is cancelled, the rule-based
//! result is returned with a single degradation reason appended.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{ScoringConfig, TrackerConfig};
use crate::session::Session;
use crate::stats::{SessionStats, compute_stats};

/// Default bound on the external refinement call.
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(5);

/// Reason attached to sessions with no edits.
pub const INSUFFICIENT_DATA_REASON: &str =
    "Insufficient data: no edits were recorded in this session.";

/// Result of a likelihood analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanLikelihoodAnalysis {
    /// Likelihood that the edits were typed by a human, in `0..=100`.
    pub score: u8,
    /// Supporting evidence, most significant first. Never empty.
    pub reasons: Vec<String>,
}

impl HumanLikelihoodAnalysis {
    pub const fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.score)
    }
}

/// Coarse reading of a score, as shown on the class dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    LikelyHuman,
    Uncertain,
    LikelyGenerated,
}

impl ScoreBand {
    pub const fn from_score(score: u8) -> Self {
        if score >= 70 {
            Self::LikelyHuman
        } else if score >= 40 {
            Self::Uncertain
        } else {
            Self::LikelyGenerated
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LikelyHuman => "likely human",
            Self::Uncertain => "uncertain",
            Self::LikelyGenerated => "likely generated",
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores a snapshot with fixed heuristics.
///
/// Lower scores mean the session looks bulk-inserted. Never fails; the score
/// is clamped and at least one reason is always produced.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn score_rules(stats: &SessionStats, config: &ScoringConfig) -> HumanLikelihoodAnalysis {
    if stats.total_edit_events == 0 {
        return HumanLikelihoodAnalysis {
            score: config.insufficient_data_score.min(100),
            reasons: vec![INSUFFICIENT_DATA_REASON.to_string()],
        };
    }

    let mut score = config.baseline;
    let mut reasons = Vec::new();

    if stats.external_paste_count > 0 {
        let ratio = stats.external_paste_ratio();
        score -= (ratio * config.paste_penalty).round() as i64;
        reasons.push(format!(
            "{:.0}% of inserted characters arrived in {} external paste(s).",
            ratio * 100.0,
            stats.external_paste_count
        ));
    } else if stats.chars_inserted > 0 {
        reasons.push("No external pastes detected.".to_string());
    }

    match stats.chars_per_active_sec() {
        Some(rate) if rate > config.max_human_chars_per_sec => {
            score -= config.speed_penalty;
            reasons.push(format!(
                "Insertion rate of {rate:.1} characters per active second exceeds a plausible typing pace."
            ));
        }
        Some(rate) if stats.chars_inserted > 0 => {
            reasons.push(format!(
                "Insertion rate of {rate:.1} characters per active second is within a human typing range."
            ));
        }
        None if stats.chars_inserted > 1 => {
            score -= config.speed_penalty;
            reasons.push(format!(
                "{} characters were inserted with no measurable active typing time.",
                stats.chars_inserted
            ));
        }
        _ => {}
    }

    if stats.focus_losses_while_editing > 0 {
        score += config.focus_loss_bonus;
        reasons.push(format!(
            "Editor focus was left {} time(s) mid-edit, consistent with consulting other material.",
            stats.focus_losses_while_editing
        ));
    }

    if stats.chars_inserted > 0
        && stats.chars_deleted as f64 / stats.chars_inserted as f64 >= config.revision_ratio
    {
        score += config.revision_bonus;
        reasons.push(format!(
            "{} characters deleted against {} inserted shows ongoing revision.",
            stats.chars_deleted, stats.chars_inserted
        ));
    }

    if stats.active_time_ms >= config.sustained_activity_ms && stats.active_time_ms > 0 {
        score += config.sustained_activity_bonus;
        reasons.push(format!(
            "{:.1} minutes of sustained active editing.",
            stats.active_time_ms as f64 / 60_000.0
        ));
    }

    if reasons.is_empty() {
        reasons.push("No distinguishing signals in the edit pattern.".to_string());
    }

    HumanLikelihoodAnalysis {
        score: score.clamp(0, 100) as u8,
        reasons,
    }
}

/// Renders a compact, line-oriented summary of a snapshot for the reasoning service.
#[allow(clippy::cast_precision_loss)]
pub fn summarize(stats: &SessionStats) -> String {
    let minutes = |ms: u64| ms as f64 / 60_000.0;
    let mut lines = vec![
        format!(
            "span: {:.1} min (active {:.1} min, inactive {:.1} min)",
            minutes(stats.span_ms()),
            minutes(stats.active_time_ms),
            minutes(stats.inactive_time_ms)
        ),
        format!(
            "edits: {} ({} chars inserted, {} deleted)",
            stats.total_edit_events, stats.chars_inserted, stats.chars_deleted
        ),
        format!(
            "pastes: {} ({} external, {} chars, {:.0}% of inserted)",
            stats.paste_events_count,
            stats.external_paste_count,
            stats.external_paste_chars,
            stats.external_paste_ratio() * 100.0
        ),
    ];
    if let Some(rate) = stats.chars_per_active_sec() {
        lines.push(format!("typing_rate: {rate:.1} chars per active second"));
    }
    lines.push(format!(
        "focus: {} changes, {} losses, {} while editing",
        stats.focus_events_count, stats.focus_loss_count, stats.focus_losses_while_editing
    ));
    lines.join("\n")
}

/// Request sent to a [`ReasoningService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementRequest {
    pub summary: String,
    pub stats: SessionStats,
    pub baseline: HumanLikelihoodAnalysis,
    /// Class-specific instructions for the service, if any.
    pub system_prompt: Option<String>,
}

/// A refined score as returned by the service, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Reasoning service failures. Never surfaced past the analyzer.
#[derive(Debug, Error)]
pub enum ReasoningError {
    /// The service could not be reached or rejected the request.
    #[error("reasoning service unavailable: {0}")]
    Unavailable(String),
    /// The service answered with something that is not a usable refinement.
    #[error("malformed reasoning response: {0}")]
    Malformed(String),
}

/// External service that can refine a rule-based analysis.
pub trait ReasoningService: Send + Sync {
    fn refine(
        &self,
        request: &RefinementRequest,
    ) -> impl Future<Output = Result<Refinement, ReasoningError>> + Send;
}

/// Placeholder service for analyzers that only run the rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesOnly;

impl ReasoningService for RulesOnly {
    async fn refine(&self, _request: &RefinementRequest) -> Result<Refinement, ReasoningError> {
        Err(ReasoningError::Unavailable(
            "no reasoning service configured".to_string(),
        ))
    }
}

/// Why the refinement phase did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Degradation {
    TimedOut,
    Cancelled,
    ServiceError,
    Malformed,
}

impl Degradation {
    const fn as_str(self) -> &'static str {
        match self {
            Self::TimedOut => "timed out",
            Self::Cancelled => "cancelled",
            Self::ServiceError => "service error",
            Self::Malformed => "malformed response",
        }
    }

    fn reason(self) -> String {
        format!(
            "External analysis unavailable ({}); using rule-based score.",
            self.as_str()
        )
    }
}

impl From<&ReasoningError> for Degradation {
    fn from(err: &ReasoningError) -> Self {
        match err {
            ReasoningError::Unavailable(_) => Self::ServiceError,
            ReasoningError::Malformed(_) => Self::Malformed,
        }
    }
}

/// Two-phase likelihood analyzer.
///
/// # Example
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use cx_core::{
///     Analyzer, ChangeNotification, ContentChange, ScoringConfig, SessionTracker,
///     TrackerConfig, UserDetails,
/// };
///
/// let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
/// let mut tracker =
///     SessionTracker::starting_at(TrackerConfig::default(), UserDetails::anonymous(), start);
/// let paste = ChangeNotification::single(ContentChange::insert("x".repeat(400)));
/// tracker.record_change(&paste, start + Duration::seconds(1));
///
/// let analyzer = Analyzer::new(ScoringConfig::default());
/// let runtime = tokio::runtime::Builder::new_current_thread()
///     .enable_time()
///     .build()
///     .unwrap();
/// let analysis = runtime.block_on(analyzer.analyze(&tracker.stats()));
/// assert!(analysis.score < 40);
/// assert!(!analysis.reasons.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Analyzer<S = RulesOnly> {
    config: ScoringConfig,
    service: Option<S>,
    timeout: Duration,
    system_prompt: Option<String>,
}

impl Analyzer<RulesOnly> {
    /// Creates an analyzer that only runs the rule-based phase.
    pub const fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            service: None,
            timeout: DEFAULT_ANALYSIS_TIMEOUT,
            system_prompt: None,
        }
    }
}

impl<S: ReasoningService> Analyzer<S> {
    /// Creates an analyzer that refines rule-based results through `service`.
    pub const fn with_service(config: ScoringConfig, service: S) -> Self {
        Self {
            config,
            service: Some(service),
            timeout: DEFAULT_ANALYSIS_TIMEOUT,
            system_prompt: None,
        }
    }

    /// Sets the bound on the refinement call.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets class-specific instructions forwarded to the service.
    #[must_use]
    pub fn system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub const fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Runs the rule-based phase only.
    pub fn score_rules(&self, stats: &SessionStats) -> HumanLikelihoodAnalysis {
        score_rules(stats, &self.config)
    }

    /// Computes stats for `session` and analyzes them.
    pub async fn analyze_session(
        &self,
        session: &Session,
        tracker: &TrackerConfig,
    ) -> HumanLikelihoodAnalysis {
        self.analyze(&compute_stats(session, tracker)).await
    }

    /// Analyzes a snapshot. Latency is bounded by the configured timeout.
    pub async fn analyze(&self, stats: &SessionStats) -> HumanLikelihoodAnalysis {
        self.analyze_until(stats, &CancellationToken::new()).await
    }

    /// Analyzes a snapshot, abandoning refinement as soon as `cancel` fires.
    pub async fn analyze_until(
        &self,
        stats: &SessionStats,
        cancel: &CancellationToken,
    ) -> HumanLikelihoodAnalysis {
        let baseline = self.score_rules(stats);
        let Some(service) = &self.service else {
            return baseline;
        };
        if stats.total_edit_events == 0 {
            return baseline;
        }

        let request = RefinementRequest {
            summary: summarize(stats),
            stats: stats.clone(),
            baseline: baseline.clone(),
            system_prompt: self.system_prompt.clone(),
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Degradation::Cancelled),
            result = tokio::time::timeout(self.timeout, service.refine(&request)) => match result {
                Err(_) => Err(Degradation::TimedOut),
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "reasoning service failed");
                    Err(Degradation::from(&err))
                }
                Ok(Ok(refinement)) => validate(refinement),
            },
        };

        match outcome {
            Ok(refined) => refined,
            Err(degradation) => {
                tracing::warn!(cause = degradation.as_str(), "falling back to rule-based score");
                let mut analysis = baseline;
                analysis.reasons.push(degradation.reason());
                analysis
            }
        }
    }
}

/// Turns a raw refinement into an analysis, or rejects it whole.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn validate(refinement: Refinement) -> Result<HumanLikelihoodAnalysis, Degradation> {
    if !refinement.score.is_finite() {
        tracing::warn!(score = refinement.score, "non-finite refined score");
        return Err(Degradation::Malformed);
    }
    let reasons: Vec<String> = refinement
        .reasons
        .into_iter()
        .map(|reason| reason.trim().to_string())
        .filter(|reason| !reason.is_empty())
        .collect();
    if reasons.is_empty() {
        tracing::warn!("refinement carried no reasons");
        return Err(Degradation::Malformed);
    }
    Ok(HumanLikelihoodAnalysis {
        score: refinement.score.round().clamp(0.0, 100.0) as u8,
        reasons,
    })
}
