//! Active/inactive time classification.
//!
//! Time is split into two buckets by walking consecutive timestamps: a gap
//! shorter than the idle threshold counts entirely as active, anything else
//! counts entirely as inactive. The split is recomputed from the full log on
//! every query, so `active + inactive` always equals the span it walked.

use chrono::{DateTime, Utc};

/// Active and inactive time over a timeline, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityTime {
    pub active_ms: u64,
    pub inactive_ms: u64,
}

impl ActivityTime {
    /// Total time covered by the timeline.
    pub const fn total_ms(&self) -> u64 {
        self.active_ms + self.inactive_ms
    }
}

/// Classifies the gaps between `start` and each following timestamp.
///
/// Timestamps are expected in ascending order. A timestamp earlier than its
/// predecessor contributes a zero gap and does not move the cursor back.
pub fn classify_gaps<I>(start: DateTime<Utc>, timestamps: I, idle_threshold_ms: u64) -> ActivityTime
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut time = ActivityTime::default();
    let mut previous = start;

    for timestamp in timestamps {
        if timestamp <= previous {
            continue;
        }
        let gap_ms = gap_millis(previous, timestamp);
        if gap_ms < idle_threshold_ms {
            time.active_ms += gap_ms;
        } else {
            time.inactive_ms += gap_ms;
        }
        previous = timestamp;
    }

    time
}

/// Milliseconds from `from` to `to`, saturating at zero.
pub fn gap_millis(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_milliseconds()).unwrap_or(0)
}
