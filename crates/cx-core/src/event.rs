//! Raw editor notifications and the typed events derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single contiguous edit reported by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChange {
    /// Text inserted at the edited range (empty for a pure deletion).
    #[serde(default)]
    pub text: String,
    /// Number of characters removed by the edit.
    #[serde(default)]
    pub range_length: u64,
}

impl ContentChange {
    /// Creates a change inserting `text` and removing `range_length` characters.
    pub fn new(text: impl Into<String>, range_length: u64) -> Self {
        Self {
            text: text.into(),
            range_length,
        }
    }

    /// Creates a pure insertion.
    pub fn insert(text: impl Into<String>) -> Self {
        Self::new(text, 0)
    }

    /// Creates a pure deletion.
    pub fn delete(range_length: u64) -> Self {
        Self::new(String::new(), range_length)
    }

    /// Number of inserted characters (Unicode scalar values, not bytes).
    pub fn inserted_chars(&self) -> u64 {
        self.text.chars().count() as u64
    }

    /// Returns `true` when the change neither inserts nor removes anything.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.range_length == 0
    }
}

/// One change notification from the editor.
///
/// A notification may carry several discontiguous edits (multi-cursor typing,
/// find-and-replace); each is classified on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    #[serde(default)]
    pub changes: Vec<ContentChange>,
}

impl ChangeNotification {
    pub fn new(changes: Vec<ContentChange>) -> Self {
        Self { changes }
    }

    /// Convenience constructor for the common single-edit case.
    pub fn single(change: ContentChange) -> Self {
        Self {
            changes: vec![change],
        }
    }
}

impl From<ContentChange> for ChangeNotification {
    fn from(change: ContentChange) -> Self {
        Self::single(change)
    }
}

/// A classified edit. A replace sets both counters on the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditEvent {
    pub timestamp: DateTime<Utc>,
    pub inserted_chars: u64,
    pub deleted_chars: u64,
}

/// A multi-character insertion that arrived in a single change.
///
/// Always accompanied by an [`EditEvent`] with the same timestamp and
/// `inserted_chars == char_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteEvent {
    pub timestamp: DateTime<Utc>,
    pub char_count: u64,
    /// `true` when the insertion is too large to be an in-editor expansion.
    pub external: bool,
}

/// An editor focus transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusEvent {
    pub timestamp: DateTime<Utc>,
    pub gained: bool,
}
