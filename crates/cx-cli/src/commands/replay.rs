//! Replay command: feeds recorded editor notifications through a live
//! session tracker and reports on the finished session.
//!
//! Input is JSON Lines, one notification per line:
//!
//! ```text
//! {"type":"change","at":"2025-03-01T09:00:01Z","changes":[{"text":"a","rangeLength":0}]}
//! {"type":"focus","at":"2025-03-01T09:00:05Z","gained":false}
//! ```
//!
//! Lines that fail to parse are skipped with a warning, the same way an
//! editor host would drop a notification it cannot interpret.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use cx_core::{
    Analyzer, ChangeNotification, ContentChange, HumanLikelihoodAnalysis, SessionStats,
    SessionTracker, UserDetails, compute_stats, spawn_tracker,
};
use cx_db::SessionReport;
use cx_llm::{ClaudeReasoner, Client};
use serde::{Deserialize, Serialize};

use crate::Config;
use crate::commands::open_database;
use crate::report::{ReportView, write_report};

/// Arguments for `cx replay`.
#[derive(Debug, Clone, Default, Args)]
pub struct ReplayArgs {
    /// JSONL file of recorded notifications ("-" or omitted reads stdin).
    pub input: Option<PathBuf>,

    /// Full name attached to the session.
    #[arg(long)]
    pub name: Option<String>,

    /// Class the session belongs to.
    #[arg(long)]
    pub class: Option<String>,

    /// Use rule-based scoring only, even when an API key is configured.
    #[arg(long)]
    pub offline: bool,

    /// Store the report in the database.
    #[arg(long)]
    pub save: bool,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordedNotification {
    Change {
        at: DateTime<Utc>,
        #[serde(default)]
        changes: Vec<ContentChange>,
    },
    Focus {
        at: DateTime<Utc>,
        gained: bool,
    },
}

impl RecordedNotification {
    pub const fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Change { at, .. } | Self::Focus { at, .. } => *at,
        }
    }
}

/// Parses JSONL notifications, skipping blank and malformed lines.
pub fn read_notifications<R: BufRead>(reader: R) -> Result<Vec<RecordedNotification>> {
    let mut notifications = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read notifications")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str(trimmed) {
            Ok(notification) => notifications.push(notification),
            Err(err) => {
                tracing::warn!(line = index + 1, error = %err, "skipping malformed notification");
            }
        }
    }
    Ok(notifications)
}

fn load_notifications(input: Option<&Path>) -> Result<Vec<RecordedNotification>> {
    match input {
        None => read_notifications(io::stdin().lock()),
        Some(path) if path == Path::new("-") => read_notifications(io::stdin().lock()),
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            read_notifications(BufReader::new(file))
        }
    }
}

/// Runs `cx replay`, reading notifications from the configured input.
pub fn run<W: Write>(writer: &mut W, args: &ReplayArgs, config: &Config) -> Result<()> {
    let notifications = load_notifications(args.input.as_deref())?;
    run_with(writer, args, config, notifications)
}

/// Runs `cx replay` over already-parsed notifications.
pub fn run_with<W: Write>(
    writer: &mut W,
    args: &ReplayArgs,
    config: &Config,
    notifications: Vec<RecordedNotification>,
) -> Result<()> {
    let user = UserDetails::new(
        args.name.as_deref().or(config.full_name.as_deref()),
        args.class.as_deref().or(config.class_name.as_deref()),
    );

    let reasoner = if args.offline {
        None
    } else {
        config
            .api_key()
            .map(|key| -> Result<ClaudeReasoner> {
                let client = Client::new(key).context("failed to create Claude client")?;
                Ok(ClaudeReasoner::new(client, &config.model))
            })
            .transpose()?
    };
    if reasoner.is_none() {
        tracing::debug!("no reasoning service configured, using rule-based analysis");
    }

    // Saving or a class-specific prompt both need the database.
    let mut db = if args.save || (reasoner.is_some() && user.class_name.is_some()) {
        Some(open_database(config)?)
    } else {
        None
    };

    let system_prompt = match (&db, &reasoner, user.class_name.as_deref()) {
        (Some(db), Some(_), Some(class)) => db.get_class(class)?.map(|class| class.system_prompt),
        _ => None,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to initialize tokio runtime")?;

    let report = runtime.block_on(async {
        let stats = track(notifications, user.clone(), config).await?;
        let analysis = analyze(&stats, reasoner, system_prompt, config).await;
        Ok::<_, anyhow::Error>(SessionReport {
            user,
            stats,
            analysis,
        })
    })?;

    if args.json {
        let json = serde_json::to_string_pretty(&ReportView::new(&report))?;
        writeln!(writer, "{json}")?;
    } else {
        write_report(writer, &report)?;
    }

    if let Some(db) = db.as_mut().filter(|_| args.save) {
        let id = db.insert_session(&report, Utc::now())?;
        eprintln!("Saved session {id}");
    }

    Ok(())
}

/// Feeds notifications through a spawned tracker and returns final stats.
async fn track(
    notifications: Vec<RecordedNotification>,
    user: UserDetails,
    config: &Config,
) -> Result<SessionStats> {
    let start = notifications
        .first()
        .map_or_else(Utc::now, RecordedNotification::at);
    let tracker = SessionTracker::starting_at(config.tracker.clone(), user, start);
    let (handle, task) = spawn_tracker(tracker);

    let total = notifications.len();
    for notification in notifications {
        match notification {
            RecordedNotification::Change { at, changes } => {
                handle.change_at(ChangeNotification::new(changes), at).await?;
            }
            RecordedNotification::Focus { at, gained } => {
                handle.focus_at(gained, at).await?;
            }
        }
    }

    let session = handle.finish().await?;
    task.await.context("session tracker task failed")?;
    tracing::debug!(notifications = total, "replay finished");
    Ok(compute_stats(&session, &config.tracker))
}

async fn analyze(
    stats: &SessionStats,
    reasoner: Option<ClaudeReasoner>,
    system_prompt: Option<String>,
    config: &Config,
) -> HumanLikelihoodAnalysis {
    match reasoner {
        Some(reasoner) => {
            Analyzer::with_service(config.scoring.clone(), reasoner)
                .timeout(config.analysis_timeout())
                .system_prompt(system_prompt)
                .analyze(stats)
                .await
        }
        None => Analyzer::new(config.scoring.clone()).analyze(stats).await,
    }
}

#[cfg(test)]
mod tests {
    use cx_core::analysis::INSUFFICIENT_DATA_REASON;
    use cx_db::Database;

    use super::*;

    fn test_config(dir: &Path) -> Config {
        Config {
            database_path: dir.join("cx.db"),
            api_key: None,
            ..Config::default()
        }
    }

    const TYPED_SESSION: &str = r#"
{"type":"change","at":"2025-03-01T09:00:00Z","changes":[{"text":"f","rangeLength":0}]}
{"type":"change","at":"2025-03-01T09:00:01Z","changes":[{"text":"n","rangeLength":0}]}
not json at all
{"type":"focus","at":"2025-03-01T09:00:02Z","gained":false}
{"type":"focus","at":"2025-03-01T09:00:40Z","gained":true}
{"type":"change","at":"2025-03-01T09:00:41Z","changes":[{"text":"","rangeLength":1}]}
"#;

    #[test]
    fn read_notifications_skips_malformed_lines() {
        let notifications = read_notifications(TYPED_SESSION.as_bytes()).unwrap();
        assert_eq!(notifications.len(), 5);
        assert_eq!(
            notifications[2],
            RecordedNotification::Focus {
                at: "2025-03-01T09:00:02Z".parse().unwrap(),
                gained: false,
            }
        );
    }

    #[test]
    fn change_without_changes_defaults_to_empty() {
        let notifications =
            read_notifications(r#"{"type":"change","at":"2025-03-01T09:00:00Z"}"#.as_bytes())
                .unwrap();
        assert_eq!(
            notifications,
            vec![RecordedNotification::Change {
                at: "2025-03-01T09:00:00Z".parse().unwrap(),
                changes: vec![],
            }]
        );
    }

    #[test]
    fn replay_reports_typed_session() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let args = ReplayArgs {
            name: Some("Ada".to_string()),
            json: true,
            offline: true,
            ..ReplayArgs::default()
        };
        let notifications = read_notifications(TYPED_SESSION.as_bytes()).unwrap();

        let mut output = Vec::new();
        run_with(&mut output, &args, &config, notifications).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();

        assert_eq!(json["userDetails"]["fullName"], "Ada");
        assert_eq!(json["stats"]["totalEditEvents"], 3);
        assert_eq!(json["stats"]["charsInserted"], 2);
        assert_eq!(json["stats"]["charsDeleted"], 1);
        assert_eq!(json["stats"]["focusLossCount"], 1);
        // 38s gap between 09:00:02 and 09:00:40 is idle; the rest is active.
        assert_eq!(json["stats"]["activeTimeMs"], 3_000);
        assert_eq!(json["stats"]["inactiveTimeMs"], 38_000);
        assert!(!temp.path().join("cx.db").exists());
    }

    #[test]
    fn replay_of_nothing_reports_insufficient_data() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let args = ReplayArgs {
            offline: true,
            ..ReplayArgs::default()
        };

        let mut output = Vec::new();
        run_with(&mut output, &args, &config, Vec::new()).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("User: anonymous"));
        assert!(output.contains("Score: 50/100 (uncertain)"));
        assert!(output.contains(INSUFFICIENT_DATA_REASON));
    }

    #[test]
    fn replay_save_persists_report() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let args = ReplayArgs {
            name: Some("Ada".to_string()),
            class: Some("CS101".to_string()),
            offline: true,
            save: true,
            ..ReplayArgs::default()
        };
        let notifications = read_notifications(TYPED_SESSION.as_bytes()).unwrap();

        let mut output = Vec::new();
        run_with(&mut output, &args, &config, notifications).unwrap();

        let db = Database::open(&config.database_path).unwrap();
        let sessions = db.list_sessions(Some("CS101")).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].report.user.full_name.as_deref(), Some("Ada"));
        assert_eq!(sessions[0].report.stats.chars_inserted, 2);
    }

    #[test]
    fn config_identity_is_used_when_flags_are_absent() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            full_name: Some("Grace".to_string()),
            class_name: Some("CS102".to_string()),
            ..test_config(temp.path())
        };
        let args = ReplayArgs {
            offline: true,
            json: true,
            ..ReplayArgs::default()
        };

        let mut output = Vec::new();
        run_with(&mut output, &args, &config, Vec::new()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["userDetails"]["fullName"], "Grace");
        assert_eq!(json["userDetails"]["className"], "CS102");
    }
}
