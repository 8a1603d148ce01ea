//! Focus transition tracking.

use chrono::{DateTime, Utc};

use crate::event::FocusEvent;

/// Filters raw focus notifications into a strictly alternating stream.
///
/// Editors tend to report the same transition twice (window and editor
/// group both fire). The second of two same-polarity notifications is
/// dropped, as is any notification stamped before the last accepted one.
#[derive(Debug, Clone, Default)]
pub struct FocusTracker {
    last: Option<FocusEvent>,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes a transition, returning the event to record if it is accepted.
    pub fn observe(&mut self, gained: bool, at: DateTime<Utc>) -> Option<FocusEvent> {
        if let Some(last) = self.last {
            if last.gained == gained {
                tracing::debug!(gained, %at, "ignoring duplicate focus notification");
                return None;
            }
            if at < last.timestamp {
                tracing::debug!(gained, %at, last = %last.timestamp, "ignoring out-of-order focus notification");
                return None;
            }
        }

        let event = FocusEvent {
            timestamp: at,
            gained,
        };
        self.last = Some(event);
        Some(event)
    }

    /// Current focus state, or `None` before the first transition.
    pub fn is_focused(&self) -> Option<bool> {
        self.last.map(|event| event.gained)
    }
}
