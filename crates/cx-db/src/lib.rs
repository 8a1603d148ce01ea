//! Storage layer for finished editing sessions.
//!
//! Provides persistence for session reports and class definitions using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization (e.g. a `Mutex<Database>`).
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), so lexicographic ordering matches
//! chronological ordering.
//!
//! ## Report Payload Storage
//!
//! The `stats` and `reasons` columns store JSON in the camelCase shape of
//! `SessionStats` and the reasons list of `HumanLikelihoodAnalysis`. The score is
//! also kept in its own column so listings can be filtered and sorted on it.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use cx_core::{HumanLikelihoodAnalysis, SessionStats, UserDetails};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use uuid::Uuid;

/// Class filter value that matches every class.
pub const ALL_CLASSES: &str = "all";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to encode a report payload.
    #[error("failed to encode session payload: {0}")]
    Encode(#[from] serde_json::Error),
    /// A class definition is missing a required field.
    #[error("invalid class: {reason}")]
    InvalidClass { reason: &'static str },
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for session {session_id}: {timestamp}")]
    TimestampParse {
        session_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored payload could not be decoded.
    #[error("invalid stored data for session {session_id}: {message}")]
    InvalidStoredData { session_id: String, message: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A class and the instructions its sessions are reviewed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,
    pub system_prompt: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Whether an upsert created or replaced a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassUpsert {
    Created,
    Updated,
}

/// The stats/analysis pair produced at the end of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub user: UserDetails,
    pub stats: SessionStats,
    pub analysis: HumanLikelihoodAnalysis,
}

/// A report as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub report: SessionReport,
}

/// Row counts, for the status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseCounts {
    pub classes: u64,
    pub sessions: u64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS classes (
                name TEXT PRIMARY KEY,
                system_prompt TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Sessions table: one finished session report per row
            -- stats: JSON SessionStats (camelCase)
            -- reasons: JSON array of strings
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                full_name TEXT,
                class_name TEXT,
                started_at TEXT NOT NULL,
                last_event_at TEXT NOT NULL,
                stats TEXT NOT NULL,
                score INTEGER NOT NULL,
                reasons TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_class ON sessions(class_name);
            CREATE INDEX IF NOT EXISTS idx_sessions_recorded ON sessions(recorded_at);
            ",
        )?;
        Ok(())
    }

    /// Creates a class or replaces its system prompt.
    pub fn upsert_class(&mut self, name: &str, system_prompt: &str) -> Result<ClassUpsert, DbError> {
        let name = name.trim();
        let system_prompt = system_prompt.trim();
        if name.is_empty() {
            return Err(DbError::InvalidClass {
                reason: "name cannot be empty",
            });
        }
        if system_prompt.is_empty() {
            return Err(DbError::InvalidClass {
                reason: "system prompt cannot be empty",
            });
        }

        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        let exists = tx
            .query_row("SELECT 1 FROM classes WHERE name = ?", [name], |_| Ok(()))
            .optional()?
            .is_some();
        tx.execute(
            "
            INSERT INTO classes (name, system_prompt, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(name) DO UPDATE SET
                system_prompt = excluded.system_prompt,
                updated_at = excluded.updated_at
            ",
            params![name, system_prompt, now],
        )?;
        tx.commit()?;

        let outcome = if exists {
            ClassUpsert::Updated
        } else {
            ClassUpsert::Created
        };
        tracing::debug!(class = name, ?outcome, "saved class");
        Ok(outcome)
    }

    /// Looks up a class by name.
    pub fn get_class(&self, name: &str) -> Result<Option<ClassRecord>, DbError> {
        let record = self
            .conn
            .query_row(
                "
                SELECT name, system_prompt, created_at, updated_at
                FROM classes
                WHERE name = ?
                ",
                [name.trim()],
                class_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Lists classes ordered by name.
    pub fn list_classes(&self) -> Result<Vec<ClassRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT name, system_prompt, created_at, updated_at
            FROM classes
            ORDER BY name ASC
            ",
        )?;
        let rows = stmt.query_map([], class_from_row)?;
        let mut classes = Vec::new();
        for row in rows {
            classes.push(row?);
        }
        Ok(classes)
    }

    /// Stores a finished session report, returning its generated ID.
    pub fn insert_session(
        &mut self,
        report: &SessionReport,
        recorded_at: DateTime<Utc>,
    ) -> Result<String, DbError> {
        let id = Uuid::new_v4().to_string();
        let stats = serde_json::to_string(&report.stats)?;
        let reasons = serde_json::to_string(&report.analysis.reasons)?;
        self.conn.execute(
            "
            INSERT INTO sessions
            (id, full_name, class_name, started_at, last_event_at, stats, score, reasons, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                id,
                report.user.full_name,
                report.user.class_name,
                format_timestamp(report.stats.start_time),
                format_timestamp(report.stats.last_event_time),
                stats,
                report.analysis.score,
                reasons,
                format_timestamp(recorded_at),
            ],
        )?;
        tracing::debug!(session_id = %id, score = report.analysis.score, "stored session report");
        Ok(id)
    }

    /// Lists stored sessions, newest first.
    ///
    /// `None` or [`ALL_CLASSES`] returns every session; any other value
    /// restricts the listing to that class.
    pub fn list_sessions(&self, class_name: Option<&str>) -> Result<Vec<StoredSession>, DbError> {
        let class_name = class_name
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != ALL_CLASSES);

        let mut stmt = self.conn.prepare(
            "
            SELECT id, full_name, class_name, stats, score, reasons, recorded_at
            FROM sessions
            WHERE ?1 IS NULL OR class_name = ?1
            ORDER BY recorded_at DESC, id DESC
            ",
        )?;
        let rows = stmt.query_map([class_name], RawSession::from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.decode()?);
        }
        Ok(sessions)
    }

    /// Counts rows in each table.
    pub fn counts(&self) -> Result<DatabaseCounts, DbError> {
        let classes: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM classes", [], |row| row.get(0))?;
        let sessions: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(DatabaseCounts {
            classes: u64::try_from(classes).unwrap_or(0),
            sessions: u64::try_from(sessions).unwrap_or(0),
        })
    }
}

fn class_from_row(row: &Row<'_>) -> rusqlite::Result<ClassRecord> {
    Ok(ClassRecord {
        name: row.get(0)?,
        system_prompt: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// Session columns before JSON decoding.
struct RawSession {
    id: String,
    full_name: Option<String>,
    class_name: Option<String>,
    stats: String,
    score: i64,
    reasons: String,
    recorded_at: String,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            full_name: row.get(1)?,
            class_name: row.get(2)?,
            stats: row.get(3)?,
            score: row.get(4)?,
            reasons: row.get(5)?,
            recorded_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<StoredSession, DbError> {
        let invalid = |message: String| DbError::InvalidStoredData {
            session_id: self.id.clone(),
            message,
        };
        let stats: SessionStats = serde_json::from_str(&self.stats)
            .map_err(|err| invalid(format!("stats: {err}")))?;
        let reasons: Vec<String> = serde_json::from_str(&self.reasons)
            .map_err(|err| invalid(format!("reasons: {err}")))?;
        let score = u8::try_from(self.score)
            .ok()
            .filter(|score| *score <= 100)
            .ok_or_else(|| invalid(format!("score out of range: {}", self.score)))?;
        let recorded_at = parse_timestamp(&self.recorded_at, &self.id)?;

        Ok(StoredSession {
            id: self.id,
            recorded_at,
            report: SessionReport {
                user: UserDetails {
                    full_name: self.full_name,
                    class_name: self.class_name,
                },
                stats,
                analysis: HumanLikelihoodAnalysis { score, reasons },
            },
        })
    }
}

fn parse_timestamp(timestamp: &str, session_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            session_id: session_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
