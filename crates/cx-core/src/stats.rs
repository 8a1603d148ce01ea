//! Read-only session snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::gap_millis;
use crate::config::TrackerConfig;
use crate::session::Session;

/// Point-in-time statistics for a session.
///
/// Computed fresh from the session log on every call and never mutated
/// afterwards, so a snapshot can be handed to any number of readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub start_time: DateTime<Utc>,
    pub last_event_time: DateTime<Utc>,
    pub total_edit_events: u64,
    pub chars_inserted: u64,
    pub chars_deleted: u64,
    pub paste_events_count: u64,
    pub external_paste_count: u64,
    pub external_paste_chars: u64,
    pub focus_events_count: u64,
    pub focus_loss_count: u64,
    /// Focus losses that happened while edits were still flowing.
    pub focus_losses_while_editing: u64,
    pub active_time_ms: u64,
    pub inactive_time_ms: u64,
}

impl SessionStats {
    /// Wall-clock span from session start to the last event.
    pub fn span_ms(&self) -> u64 {
        gap_millis(self.start_time, self.last_event_time)
    }

    /// Share of inserted characters that arrived through external pastes.
    #[allow(clippy::cast_precision_loss)]
    pub fn external_paste_ratio(&self) -> f64 {
        if self.chars_inserted == 0 {
            return 0.0;
        }
        self.external_paste_chars as f64 / self.chars_inserted as f64
    }

    /// Inserted characters per second of active time, if any time was active.
    #[allow(clippy::cast_precision_loss)]
    pub fn chars_per_active_sec(&self) -> Option<f64> {
        if self.active_time_ms == 0 {
            return None;
        }
        Some(self.chars_inserted as f64 * 1000.0 / self.active_time_ms as f64)
    }
}

/// Computes a snapshot of `session`.
///
/// Safe to call before any event is recorded; an empty session yields zero
/// counters and zero active/inactive time.
pub fn compute_stats(session: &Session, config: &TrackerConfig) -> SessionStats {
    let activity = session.activity(config.idle_threshold_ms);
    let pastes = session.paste_events();
    let focus = session.focus_events();

    let external: Vec<_> = pastes.iter().filter(|paste| paste.external).collect();
    let focus_loss_count = focus.iter().filter(|event| !event.gained).count() as u64;

    SessionStats {
        start_time: session.start_time(),
        last_event_time: session.last_event_time(),
        total_edit_events: session.edit_events().len() as u64,
        chars_inserted: session.chars_inserted(),
        chars_deleted: session.chars_deleted(),
        paste_events_count: pastes.len() as u64,
        external_paste_count: external.len() as u64,
        external_paste_chars: external.iter().map(|paste| paste.char_count).sum(),
        focus_events_count: focus.len() as u64,
        focus_loss_count,
        focus_losses_while_editing: focus_losses_while_editing(session, config.idle_threshold_ms),
        active_time_ms: activity.active_ms,
        inactive_time_ms: activity.inactive_ms,
    }
}

/// Counts focus losses preceded by an edit within the idle threshold.
fn focus_losses_while_editing(session: &Session, idle_threshold_ms: u64) -> u64 {
    let edits = session.edit_events();
    let mut next_edit = 0;
    let mut last_edit_at = None;
    let mut count = 0;

    for event in session.focus_events().iter().filter(|event| !event.gained) {
        while next_edit < edits.len() && edits[next_edit].timestamp <= event.timestamp {
            last_edit_at = Some(edits[next_edit].timestamp);
            next_edit += 1;
        }
        let recent = last_edit_at
            .is_some_and(|edit_at| gap_millis(edit_at, event.timestamp) < idle_threshold_ms);
        if recent {
            count += 1;
        }
    }

    count
}
