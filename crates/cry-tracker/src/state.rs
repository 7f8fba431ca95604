//! Cry state tracking types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monitor state as seen from outside the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    #[default]
    Calm,
    PendingCry,
    Crying,
    PendingCalm,
}

impl MonitorState {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Calm => "calm",
            MonitorState::PendingCry => "pending_cry",
            MonitorState::Crying => "crying",
            MonitorState::PendingCalm => "pending_calm",
        }
    }
}

/// Confirmed transition of the crying flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionEvent {
    /// Crying confirmed at `at`
    Started { at: DateTime<Utc> },
    /// Calm confirmed at `at`
    Stopped { at: DateTime<Utc> },
}

impl TransitionEvent {
    /// Confirmation timestamp
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            TransitionEvent::Started { at } | TransitionEvent::Stopped { at } => *at,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, TransitionEvent::Started { .. })
    }
}

/// Tracker state (mutated only by the tracker)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    /// Last confirmed value of the crying flag
    pub confirmed_crying: bool,

    /// Value waiting out the debounce window; never equal to `confirmed_crying`
    pub pending_crying: Option<bool>,

    /// First observation of the pending value
    pub pending_since: Option<DateTime<Utc>>,

    /// Observation time of the snapshot that last confirmed a transition
    pub last_confirmed_at: Option<DateTime<Utc>>,
}

impl TrackerState {
    /// Derive the externally visible monitor state
    pub fn monitor_state(&self) -> MonitorState {
        match (self.confirmed_crying, self.pending_crying) {
            (false, None) => MonitorState::Calm,
            (false, Some(_)) => MonitorState::PendingCry,
            (true, None) => MonitorState::Crying,
            (true, Some(_)) => MonitorState::PendingCalm,
        }
    }

    /// Drop any pending window
    pub(crate) fn clear_pending(&mut self) -> bool {
        self.pending_since = None;
        self.pending_crying.take().is_some()
    }
}
