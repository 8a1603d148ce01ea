//! Status command for showing where data lives and how much of it there is.

use std::io::Write;

use anyhow::Result;

use crate::Config;
use crate::commands::open_database;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let counts = db.counts()?;

    writeln!(writer, "Cognix status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(
        writer,
        "Analysis: {}",
        if config.api_key().is_some() {
            format!("rules + {} (timeout {} ms)", config.model, config.analysis_timeout_ms)
        } else {
            "rules only".to_string()
        }
    )?;
    writeln!(writer, "Classes: {}", counts.classes)?;
    writeln!(writer, "Sessions: {}", counts.sessions)?;

    Ok(())
}
