//! Class management: the per-class instructions used for refined analysis.

use std::io::Write;

use anyhow::{Result, bail};
use cx_db::{ClassUpsert, Database};

/// Creates a class or replaces its system prompt.
pub fn set<W: Write>(writer: &mut W, db: &mut Database, name: &str, prompt: &str) -> Result<()> {
    let outcome = db.upsert_class(name, prompt)?;
    let verb = match outcome {
        ClassUpsert::Created => "created",
        ClassUpsert::Updated => "updated",
    };
    writeln!(writer, "Class {verb}: {}", name.trim())?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    let classes = db.list_classes()?;
    if classes.is_empty() {
        writeln!(writer, "No classes defined.")?;
        return Ok(());
    }

    let width = classes
        .iter()
        .map(|class| class.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    writeln!(writer, "{:<width$}  UPDATED", "NAME")?;
    for class in classes {
        writeln!(writer, "{:<width$}  {}", class.name, class.updated_at)?;
    }
    Ok(())
}

pub fn show<W: Write>(writer: &mut W, db: &Database, name: &str) -> Result<()> {
    let Some(class) = db.get_class(name)? else {
        bail!("class not found: {}", name.trim());
    };

    writeln!(writer, "Class: {}", class.name)?;
    writeln!(writer, "Created: {}", class.created_at)?;
    writeln!(writer, "Updated: {}", class.updated_at)?;
    writeln!(writer, "System prompt:")?;
    for line in class.system_prompt.lines() {
        writeln!(writer, "  {line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_of(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut output = Vec::new();
        f(&mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn set_reports_created_then_updated() {
        let mut db = Database::open_in_memory().unwrap();

        let first = output_of(|out| set(out, &mut db, " CS101 ", "Be strict."));
        let second = output_of(|out| set(out, &mut db, "CS101", "Be lenient."));

        assert_eq!(first, "Class created: CS101\n");
        assert_eq!(second, "Class updated: CS101\n");
        assert_eq!(
            db.get_class("CS101").unwrap().unwrap().system_prompt,
            "Be lenient."
        );
    }

    #[test]
    fn set_rejects_blank_prompt() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        let err = set(&mut output, &mut db, "CS101", "   ").unwrap_err();
        assert!(err.to_string().contains("system prompt cannot be empty"));
    }

    #[test]
    fn list_aligns_names() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(output_of(|out| list(out, &db)), "No classes defined.\n");

        db.upsert_class("Algorithms", "Prompt A").unwrap();
        db.upsert_class("CS1", "Prompt B").unwrap();

        let output = output_of(|out| list(out, &db));
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME        UPDATED"));
        assert!(lines[1].starts_with("Algorithms  "));
        assert!(lines[2].starts_with("CS1         "));
    }

    #[test]
    fn show_prints_prompt_and_fails_for_unknown_class() {
        let mut db = Database::open_in_memory().unwrap();
        db.upsert_class("CS101", "Line one.\nLine two.").unwrap();

        let output = output_of(|out| show(out, &db, "CS101"));
        assert!(output.starts_with("Class: CS101\n"));
        assert!(output.ends_with("System prompt:\n  Line one.\n  Line two.\n"));

        let mut sink = Vec::new();
        let err = show(&mut sink, &db, "CS999").unwrap_err();
        assert_eq!(err.to_string(), "class not found: CS999");
    }
}
