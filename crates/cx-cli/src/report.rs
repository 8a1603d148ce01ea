//! Rendering of session reports for terminal and JSON output.

use std::io::{self, Write};

use cx_core::{HumanLikelihoodAnalysis, ScoreBand, SessionStats, UserDetails};
use cx_db::{SessionReport, StoredSession};
use serde::Serialize;

/// JSON shape of a report, matching the class dashboard's session records.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    pub user_details: &'a UserDetails,
    pub stats: &'a SessionStats,
    pub analysis: &'a HumanLikelihoodAnalysis,
    pub band: ScoreBand,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<'a> ReportView<'a> {
    pub const fn new(report: &'a SessionReport) -> Self {
        Self {
            id: None,
            user_details: &report.user,
            stats: &report.stats,
            analysis: &report.analysis,
            band: report.analysis.band(),
            timestamp: None,
        }
    }

    pub fn stored(session: &'a StoredSession) -> Self {
        Self {
            id: Some(&session.id),
            timestamp: Some(session.recorded_at.to_rfc3339()),
            ..Self::new(&session.report)
        }
    }
}

/// Display label for a session's identity.
pub fn user_label(user: &UserDetails) -> String {
    let name = user.full_name.as_deref().unwrap_or("anonymous");
    match user.class_name.as_deref() {
        Some(class) => format!("{name} ({class})"),
        None => name.to_string(),
    }
}

/// Minutes rounded to the nearest whole minute.
pub const fn whole_minutes(ms: u64) -> u64 {
    (ms + 30_000) / 60_000
}

#[allow(clippy::cast_precision_loss)]
fn minutes(ms: u64) -> f64 {
    ms as f64 / 60_000.0
}

/// Writes the end-of-session summary.
pub fn write_report<W: Write>(writer: &mut W, report: &SessionReport) -> io::Result<()> {
    let stats = &report.stats;
    let analysis = &report.analysis;

    writeln!(writer, "Session summary")?;
    writeln!(writer, "User: {}", user_label(&report.user))?;
    writeln!(
        writer,
        "Span: {:.1} min (active {:.1} min, inactive {:.1} min)",
        minutes(stats.span_ms()),
        minutes(stats.active_time_ms),
        minutes(stats.inactive_time_ms)
    )?;
    writeln!(
        writer,
        "Edits: {} ({} chars inserted, {} deleted)",
        stats.total_edit_events, stats.chars_inserted, stats.chars_deleted
    )?;
    writeln!(
        writer,
        "Pastes: {} ({} external, {} chars)",
        stats.paste_events_count, stats.external_paste_count, stats.external_paste_chars
    )?;
    writeln!(
        writer,
        "Focus: {} changes ({} losses)",
        stats.focus_events_count, stats.focus_loss_count
    )?;
    writeln!(writer, "Score: {}/100 ({})", analysis.score, analysis.band())?;
    writeln!(writer, "Reasons:")?;
    for reason in &analysis.reasons {
        writeln!(writer, "- {reason}")?;
    }
    Ok(())
}
