//! Sessions command: the class dashboard over stored session reports.

use std::io::Write;

use anyhow::Result;
use cx_db::{ALL_CLASSES, Database, StoredSession};

use crate::report::{ReportView, whole_minutes};

pub fn run<W: Write>(writer: &mut W, db: &Database, class: Option<&str>, json: bool) -> Result<()> {
    let sessions = db.list_sessions(class)?;

    if json {
        let views: Vec<_> = sessions.iter().map(ReportView::stored).collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&views)?)?;
        return Ok(());
    }

    if sessions.is_empty() {
        match class.map(str::trim).filter(|c| !c.is_empty() && *c != ALL_CLASSES) {
            Some(class) => writeln!(writer, "No sessions recorded for class {class}.")?,
            None => writeln!(writer, "No sessions recorded.")?,
        }
        return Ok(());
    }

    writeln!(
        writer,
        "{:<20}  {:<20}  {:<12}  {:>5}  {:<17}  {:>6}",
        "RECORDED", "NAME", "CLASS", "SCORE", "BAND", "ACTIVE"
    )?;
    for session in &sessions {
        write_row(writer, session)?;
    }
    Ok(())
}

fn write_row<W: Write>(writer: &mut W, session: &StoredSession) -> Result<()> {
    let report = &session.report;
    let recorded = session.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let name = report.user.full_name.as_deref().unwrap_or("anonymous");
    let class = report.user.class_name.as_deref().unwrap_or("-");
    let active = format!("{} min", whole_minutes(report.stats.active_time_ms));

    writeln!(
        writer,
        "{recorded:<20}  {name:<20}  {class:<12}  {:>5}  {:<17}  {active:>6}",
        report.analysis.score,
        report.analysis.band().as_str(),
    )?;
    for reason in &report.analysis.reasons {
        writeln!(writer, "    - {reason}")?;
    }
    Ok(())
}
