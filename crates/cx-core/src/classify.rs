//! Change classification and paste detection.
//!
//! Every non-empty [`ContentChange`] becomes exactly one [`EditEvent`]. When the
//! insertion is large enough to not be a single keystroke, a [`PasteEvent`] is
//! emitted alongside it. Detection only looks at the change being classified:
//! a burst of single-character changes never adds up to a paste.

use chrono::{DateTime, Utc};

use crate::config::TrackerConfig;
use crate::event::{ChangeNotification, ContentChange, EditEvent, PasteEvent};

/// Result of classifying one content change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub edit: EditEvent,
    pub paste: Option<PasteEvent>,
}

/// Classifies every change in a notification, dropping empty ones.
pub fn classify(
    notification: &ChangeNotification,
    at: DateTime<Utc>,
    config: &TrackerConfig,
) -> Vec<Classified> {
    notification
        .changes
        .iter()
        .filter_map(|change| classify_change(change, at, config))
        .collect()
}

/// Classifies a single change. Returns `None` for a change with no effect.
pub fn classify_change(
    change: &ContentChange,
    at: DateTime<Utc>,
    config: &TrackerConfig,
) -> Option<Classified> {
    if change.is_empty() {
        tracing::trace!(%at, "dropping empty content change");
        return None;
    }

    let inserted_chars = change.inserted_chars();
    let edit = EditEvent {
        timestamp: at,
        inserted_chars,
        deleted_chars: change.range_length,
    };
    Some(Classified {
        edit,
        paste: detect_paste(inserted_chars, at, config),
    })
}

/// Decides whether an insertion that arrived in one change is a paste.
///
/// Insertions shorter than `paste_min_chars` are keystrokes. Anything longer
/// than `paste_threshold_chars` is external; the band in between (bracket
/// auto-closing, snippet and autocomplete expansion) is an internal paste.
pub fn detect_paste(
    inserted_chars: u64,
    at: DateTime<Utc>,
    config: &TrackerConfig,
) -> Option<PasteEvent> {
    if inserted_chars < config.paste_min_chars.max(1) {
        return None;
    }
    Some(PasteEvent {
        timestamp: at,
        char_count: inserted_chars,
        external: inserted_chars > config.paste_threshold_chars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn twenty_one_chars_is_external_paste() {
        let change = ContentChange::insert("a".repeat(21));
        let classified = classify_change(&change, at(), &TrackerConfig::default()).unwrap();
        let paste = classified.paste.unwrap();
        assert!(paste.external);
        assert_eq!(paste.char_count, 21);
        assert_eq!(classified.edit.inserted_chars, 21);
        assert_eq!(paste.timestamp, classified.edit.timestamp);
    }

    #[test]
    fn twenty_chars_is_internal_paste() {
        let change = ContentChange::insert("a".repeat(20));
        let classified = classify_change(&change, at(), &TrackerConfig::default()).unwrap();
        let paste = classified.paste.unwrap();
        assert!(!paste.external);
        assert_eq!(paste.char_count, 20);
    }

    #[test]
    fn single_keystroke_is_not_a_paste() {
        let change = ContentChange::insert("x");
        let classified = classify_change(&change, at(), &TrackerConfig::default()).unwrap();
        assert!(classified.paste.is_none());
        assert_eq!(classified.edit.inserted_chars, 1);
    }

    #[test]
    fn replace_sets_both_counters_on_one_event() {
        let change = ContentChange::new("let", 5);
        let classified = classify_change(&change, at(), &TrackerConfig::default()).unwrap();
        assert_eq!(classified.edit.inserted_chars, 3);
        assert_eq!(classified.edit.deleted_chars, 5);
    }

    #[test]
    fn pure_deletion_has_no_paste() {
        let classified =
            classify_change(&ContentChange::delete(40), at(), &TrackerConfig::default()).unwrap();
        assert_eq!(classified.edit.inserted_chars, 0);
        assert_eq!(classified.edit.deleted_chars, 40);
        assert!(classified.paste.is_none());
    }

    #[test]
    fn empty_changes_are_dropped() {
        let notification = ChangeNotification::new(vec![
            ContentChange::default(),
            ContentChange::insert("a"),
            ContentChange::default(),
        ]);
        let classified = classify(&notification, at(), &TrackerConfig::default());
        assert_eq!(classified.len(), 1);
    }

    #[test]
    fn multi_cursor_edits_are_classified_independently() {
        let notification = ChangeNotification::new(vec![
            ContentChange::insert("x"),
            ContentChange::insert("y"),
            ContentChange::insert("z"),
        ]);
        let classified = classify(&notification, at(), &TrackerConfig::default());
        assert_eq!(classified.len(), 3);
        assert!(classified.iter().all(|c| c.paste.is_none()));
    }

    #[test]
    fn paste_threshold_is_configurable() {
        let config = TrackerConfig {
            paste_threshold_chars: 5,
            ..TrackerConfig::default()
        };
        let paste = detect_paste(6, at(), &config).unwrap();
        assert!(paste.external);
    }
}
