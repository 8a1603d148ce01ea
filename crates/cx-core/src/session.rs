//! The editing session aggregate.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{self, ActivityTime};
use crate::classify::Classified;
use crate::event::{EditEvent, FocusEvent, PasteEvent};

/// Who produced the session, when the identity prompt was answered.
///
/// Both fields are optional; a session without them is anonymous and is
/// tracked exactly the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl UserDetails {
    /// Builds details from prompt answers, treating blank answers as missing.
    pub fn new(full_name: Option<&str>, class_name: Option<&str>) -> Self {
        Self {
            full_name: non_blank(full_name),
            class_name: non_blank(class_name),
        }
    }

    /// Anonymous identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub const fn is_anonymous(&self) -> bool {
        self.full_name.is_none() && self.class_name.is_none()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Append-only record of one editing context.
///
/// Counters and logs are only mutated through [`Session::record_edit`] and
/// [`Session::record_focus`], each of which applies one event completely, so
/// `chars_inserted`/`chars_deleted` always equal the sums over `edit_events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    start_time: DateTime<Utc>,
    last_event_time: DateTime<Utc>,
    chars_inserted: u64,
    chars_deleted: u64,
    edit_events: Vec<EditEvent>,
    paste_events: Vec<PasteEvent>,
    focus_events: Vec<FocusEvent>,
    active_time_ms: u64,
    inactive_time_ms: u64,
    #[serde(default)]
    user: UserDetails,
}

impl Session {
    /// Starts an empty session.
    pub fn new(start_time: DateTime<Utc>, user: UserDetails) -> Self {
        let start_time = start_time.trunc_subsecs(3);
        Self {
            start_time,
            last_event_time: start_time,
            chars_inserted: 0,
            chars_deleted: 0,
            edit_events: Vec::new(),
            paste_events: Vec::new(),
            focus_events: Vec::new(),
            active_time_ms: 0,
            inactive_time_ms: 0,
            user,
        }
    }

    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub const fn last_event_time(&self) -> DateTime<Utc> {
        self.last_event_time
    }

    pub const fn chars_inserted(&self) -> u64 {
        self.chars_inserted
    }

    pub const fn chars_deleted(&self) -> u64 {
        self.chars_deleted
    }

    pub fn edit_events(&self) -> &[EditEvent] {
        &self.edit_events
    }

    pub fn paste_events(&self) -> &[PasteEvent] {
        &self.paste_events
    }

    pub fn focus_events(&self) -> &[FocusEvent] {
        &self.focus_events
    }

    /// Active time as of the last [`Session::refresh_activity`].
    pub const fn active_time_ms(&self) -> u64 {
        self.active_time_ms
    }

    /// Inactive time as of the last [`Session::refresh_activity`].
    pub const fn inactive_time_ms(&self) -> u64 {
        self.inactive_time_ms
    }

    pub const fn user(&self) -> &UserDetails {
        &self.user
    }

    pub fn set_user(&mut self, user: UserDetails) {
        self.user = user;
    }

    /// Returns `true` once any edit or focus event has been recorded.
    pub fn has_events(&self) -> bool {
        !self.edit_events.is_empty() || !self.focus_events.is_empty()
    }

    /// Pins `at` so it never precedes the last recorded event.
    ///
    /// Producers stamp notifications on arrival; two producers racing on the
    /// same channel can deliver a slightly older stamp after a newer one.
    /// Stamps are stored at millisecond precision so per-gap millisecond
    /// counts always add up to the session span.
    pub fn clamp_timestamp(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        at.trunc_subsecs(3).max(self.last_event_time)
    }

    /// Applies one classified change: the edit, its paste (if any), and the counters.
    pub fn record_edit(&mut self, classified: Classified) {
        let Classified { mut edit, paste } = classified;
        edit.timestamp = self.clamp_timestamp(edit.timestamp);

        self.chars_inserted += edit.inserted_chars;
        self.chars_deleted += edit.deleted_chars;
        self.last_event_time = edit.timestamp;
        self.edit_events.push(edit);

        if let Some(mut paste) = paste {
            paste.timestamp = edit.timestamp;
            paste.char_count = edit.inserted_chars;
            self.paste_events.push(paste);
        }
    }

    /// Appends an accepted focus transition.
    pub fn record_focus(&mut self, mut event: FocusEvent) {
        event.timestamp = self.clamp_timestamp(event.timestamp);
        self.last_event_time = event.timestamp;
        self.focus_events.push(event);
    }

    /// Every recorded timestamp (edits and focus changes) in ascending order.
    pub fn timeline(&self) -> Vec<DateTime<Utc>> {
        let mut stamps: Vec<DateTime<Utc>> = self
            .edit_events
            .iter()
            .map(|event| event.timestamp)
            .chain(self.focus_events.iter().map(|event| event.timestamp))
            .collect();
        stamps.sort_unstable();
        stamps
    }

    /// Recomputes active/inactive time from the full log.
    pub fn activity(&self, idle_threshold_ms: u64) -> ActivityTime {
        activity::classify_gaps(self.start_time, self.timeline(), idle_threshold_ms)
    }

    /// Stores a fresh activity split on the session, for reporting after close.
    pub fn refresh_activity(&mut self, idle_threshold_ms: u64) {
        let time = self.activity(idle_threshold_ms);
        self.active_time_ms = time.active_ms;
        self.inactive_time_ms = time.inactive_ms;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn t(ms: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::milliseconds(ms)
    }

    fn edit(ms: i64, inserted: u64, deleted: u64) -> Classified {
        Classified {
            edit: EditEvent {
                timestamp: t(ms),
                inserted_chars: inserted,
                deleted_chars: deleted,
            },
            paste: None,
        }
    }

    #[test]
    fn new_session_is_empty() {
        let session = Session::new(t(0), UserDetails::anonymous());
        assert!(!session.has_events());
        assert_eq!(session.start_time(), session.last_event_time());
        assert_eq!(session.chars_inserted(), 0);
        assert_eq!(session.chars_deleted(), 0);
    }

    #[test]
    fn counters_track_edit_log() {
        let mut session = Session::new(t(0), UserDetails::anonymous());
        session.record_edit(edit(100, 3, 0));
        session.record_edit(edit(200, 0, 2));
        session.record_edit(edit(300, 4, 1));

        let inserted: u64 = session.edit_events().iter().map(|e| e.inserted_chars).sum();
        let deleted: u64 = session.edit_events().iter().map(|e| e.deleted_chars).sum();
        assert_eq!(session.chars_inserted(), inserted);
        assert_eq!(session.chars_deleted(), deleted);
        assert_eq!(session.last_event_time(), t(300));
    }

    #[test]
    fn stale_timestamps_are_clamped() {
        let mut session = Session::new(t(0), UserDetails::anonymous());
        session.record_edit(edit(500, 1, 0));
        session.record_edit(edit(400, 1, 0));
        assert_eq!(session.edit_events()[1].timestamp, t(500));
        assert_eq!(session.last_event_time(), t(500));
    }

    #[test]
    fn edit_before_start_is_clamped_to_start() {
        let mut session = Session::new(t(1_000), UserDetails::anonymous());
        session.record_edit(edit(0, 1, 0));
        assert_eq!(session.edit_events()[0].timestamp, t(1_000));
    }

    #[test]
    fn paste_shares_timestamp_and_count_with_its_edit() {
        let mut session = Session::new(t(0), UserDetails::anonymous());
        session.record_edit(edit(900, 1, 0));
        session.record_edit(Classified {
            edit: EditEvent {
                timestamp: t(800),
                inserted_chars: 30,
                deleted_chars: 0,
            },
            paste: Some(PasteEvent {
                timestamp: t(800),
                char_count: 30,
                external: true,
            }),
        });

        let paste = session.paste_events()[0];
        let edit = session.edit_events()[1];
        assert_eq!(paste.timestamp, edit.timestamp);
        assert_eq!(paste.char_count, edit.inserted_chars);
    }

    #[test]
    fn timeline_merges_edits_and_focus() {
        let mut session = Session::new(t(0), UserDetails::anonymous());
        session.record_edit(edit(100, 1, 0));
        session.record_focus(FocusEvent {
            timestamp: t(200),
            gained: false,
        });
        session.record_edit(edit(300, 1, 0));
        assert_eq!(session.timeline(), vec![t(100), t(200), t(300)]);
    }

    #[test]
    fn refresh_activity_partitions_session_span() {
        let mut session = Session::new(t(0), UserDetails::anonymous());
        session.record_edit(edit(10_000, 1, 0));
        session.record_edit(edit(50_000, 1, 0));
        session.refresh_activity(30_000);
        assert_eq!(session.active_time_ms(), 10_000);
        assert_eq!(session.inactive_time_ms(), 40_000);
    }

    #[test]
    fn sub_millisecond_stamps_still_partition_the_span() {
        let start = t(0) + Duration::microseconds(400);
        let mut session = Session::new(start, UserDetails::anonymous());
        for i in 1..=10 {
            let mut change = edit(0, 1, 0);
            change.edit.timestamp = start + Duration::microseconds(600 * i);
            session.record_edit(change);
        }

        let time = session.activity(30_000);
        let span = activity::gap_millis(session.start_time(), session.last_event_time());
        assert_eq!(session.start_time(), t(0));
        assert_eq!(span, 6);
        assert_eq!(time.active_ms + time.inactive_ms, span);
        assert_eq!(time.active_ms, 6);
    }

    #[test]
    fn blank_identity_is_anonymous() {
        let user = UserDetails::new(Some("  "), None);
        assert!(user.is_anonymous());
        let user = UserDetails::new(Some(" Ada "), Some("CS101"));
        assert_eq!(user.full_name.as_deref(), Some("Ada"));
        assert_eq!(user.class_name.as_deref(), Some("CS101"));
    }
}
