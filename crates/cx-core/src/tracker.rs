//! Session ownership and the ingestion channel.
//!
//! [`SessionTracker`] owns one [`Session`] and applies notifications to it.
//! [`spawn_tracker`] moves a tracker into a task fed by a bounded channel, so
//! editor callbacks only ever send, and every mutation happens in arrival
//! order on one consumer. Snapshots are requested over the same channel and
//! therefore always reflect a complete prefix of the notifications.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::classify::classify;
use crate::config::TrackerConfig;
use crate::event::ChangeNotification;
use crate::focus::FocusTracker;
use crate::session::{Session, UserDetails};
use crate::stats::{SessionStats, compute_stats};

/// Errors from the producer side of the ingestion channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TrackerError {
    /// The tracker task has finished or was dropped.
    #[error("session tracker has stopped")]
    Closed,
    /// The channel is at capacity (only from the non-blocking senders).
    #[error("session tracker channel is full")]
    Full,
}

/// Owns the session for one editing context.
#[derive(Debug)]
pub struct SessionTracker {
    config: TrackerConfig,
    session: Session,
    focus: FocusTracker,
}

impl SessionTracker {
    /// Starts a session now.
    pub fn new(config: TrackerConfig, user: UserDetails) -> Self {
        Self::starting_at(config, user, Utc::now())
    }

    /// Starts a session at an explicit time.
    pub fn starting_at(config: TrackerConfig, user: UserDetails, start: DateTime<Utc>) -> Self {
        Self {
            config,
            session: Session::new(start, user),
            focus: FocusTracker::new(),
        }
    }

    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Applies a change notification, returning how many edits were recorded.
    pub fn record_change(&mut self, notification: &ChangeNotification, at: DateTime<Utc>) -> usize {
        let at = self.session.clamp_timestamp(at);
        let classified = classify(notification, at, &self.config);
        if classified.is_empty() {
            tracing::debug!(%at, "dropping change notification with no effect");
            return 0;
        }

        let recorded = classified.len();
        for change in classified {
            if let Some(paste) = change.paste {
                tracing::debug!(chars = paste.char_count, external = paste.external, "paste detected");
            }
            self.session.record_edit(change);
        }
        recorded
    }

    /// Applies a focus transition, returning `false` if it was a duplicate or
    /// stamped before the previous transition.
    ///
    /// An accepted transition is clamped to the last recorded event when stored.
    pub fn record_focus(&mut self, gained: bool, at: DateTime<Utc>) -> bool {
        match self.focus.observe(gained, at) {
            Some(event) => {
                self.session.record_focus(event);
                true
            }
            None => false,
        }
    }

    /// Takes a snapshot of the session as it stands.
    pub fn stats(&self) -> SessionStats {
        compute_stats(&self.session, &self.config)
    }

    /// Ends the session, returning it read-only with its activity split filled in.
    pub fn finish(mut self) -> Session {
        self.session.refresh_activity(self.config.idle_threshold_ms);
        self.session
    }
}

#[derive(Debug)]
enum Command {
    Change {
        at: DateTime<Utc>,
        notification: ChangeNotification,
    },
    Focus {
        at: DateTime<Utc>,
        gained: bool,
    },
    Snapshot(oneshot::Sender<SessionStats>),
    Finish(oneshot::Sender<Session>),
}

/// Producer side of a spawned tracker. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<Command>,
}

impl TrackerHandle {
    /// Sends a change notification stamped with the current time.
    pub async fn change(&self, notification: ChangeNotification) -> Result<(), TrackerError> {
        self.change_at(notification, Utc::now()).await
    }

    /// Sends a change notification with an explicit arrival time.
    pub async fn change_at(
        &self,
        notification: ChangeNotification,
        at: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        self.send(Command::Change { at, notification }).await
    }

    /// Sends a change notification without waiting for channel capacity.
    ///
    /// Intended for synchronous editor callbacks.
    pub fn try_change(&self, notification: ChangeNotification) -> Result<(), TrackerError> {
        self.try_send(Command::Change {
            at: Utc::now(),
            notification,
        })
    }

    /// Sends a focus transition stamped with the current time.
    pub async fn focus(&self, gained: bool) -> Result<(), TrackerError> {
        self.focus_at(gained, Utc::now()).await
    }

    /// Sends a focus transition with an explicit arrival time.
    pub async fn focus_at(&self, gained: bool, at: DateTime<Utc>) -> Result<(), TrackerError> {
        self.send(Command::Focus { at, gained }).await
    }

    /// Sends a focus transition without waiting for channel capacity.
    pub fn try_focus(&self, gained: bool) -> Result<(), TrackerError> {
        self.try_send(Command::Focus {
            at: Utc::now(),
            gained,
        })
    }

    /// Requests a snapshot covering every notification sent before this call.
    pub async fn snapshot(&self) -> Result<SessionStats, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| TrackerError::Closed)
    }

    /// Ends the session and returns it. Later sends fail with [`TrackerError::Closed`].
    pub async fn finish(&self) -> Result<Session, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Finish(reply)).await?;
        rx.await.map_err(|_| TrackerError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), TrackerError> {
        self.tx.send(command).await.map_err(|_| TrackerError::Closed)
    }

    fn try_send(&self, command: Command) -> Result<(), TrackerError> {
        self.tx.try_send(command).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => TrackerError::Full,
            mpsc::error::TrySendError::Closed(_) => TrackerError::Closed,
        })
    }
}

/// Moves `tracker` into a task and returns the handle that feeds it.
///
/// The task ends when [`TrackerHandle::finish`] is called or when every handle
/// is dropped. Must be called from within a tokio runtime.
pub fn spawn_tracker(tracker: SessionTracker) -> (TrackerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(tracker.config.channel_capacity.max(1));
    let task = tokio::spawn(run(tracker, rx));
    (TrackerHandle { tx }, task)
}

async fn run(mut tracker: SessionTracker, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Change { at, notification } => {
                tracker.record_change(&notification, at);
            }
            Command::Focus { at, gained } => {
                tracker.record_focus(gained, at);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(tracker.stats());
            }
            Command::Finish(reply) => {
                rx.close();
                let _ = reply.send(tracker.finish());
                return;
            }
        }
    }
    tracing::debug!(
        edits = tracker.session().edit_events().len(),
        "all tracker handles dropped; discarding session"
    );
}
