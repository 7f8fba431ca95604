//! Debounced state tracker
//!
//! ```text
//!            raw=true            held >= debounce
//!   Calm ─────────────► PendingCry ─────────────► Crying
//!    ▲                     │                        │
//!    │      raw=false      │                        │ raw=false
//!    ├─────────────────────┘                        ▼
//!    │        held >= debounce                 PendingCalm
//!    └──────────────────────────────────────────────┤
//!                          raw=true (flap)          │
//!                   Crying ◄────────────────────────┘
//! ```
//!
//! Time is taken from `Snapshot::observed_at`, never from the local clock,
//! so replaying the same history always yields the same transitions.

use chrono::{DateTime, Duration, Utc};
use data_validator::Snapshot;
use tracing::debug;

use crate::state::{MonitorState, TrackerState, TransitionEvent};

/// Debounced crying-state tracker
#[derive(Debug, Clone)]
pub struct DebouncedStateTracker {
    debounce: Duration,
    state: TrackerState,
}

impl DebouncedStateTracker {
    /// Create a tracker requiring a new value to hold for `debounce`
    ///
    /// A zero debounce confirms on the first disagreeing snapshot.
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: TrackerState::default(),
        }
    }

    /// Feed one snapshot, returning a transition if one was confirmed
    pub fn update(&mut self, snapshot: &Snapshot) -> Option<TransitionEvent> {
        if self.is_stale(snapshot) {
            debug!(
                observed_at = %snapshot.observed_at,
                "ignoring snapshot older than last confirmed transition"
            );
            return None;
        }

        let raw = snapshot.is_crying;
        let now = snapshot.observed_at;

        if raw == self.state.confirmed_crying {
            if self.state.clear_pending() {
                debug!(raw, %now, "flap rejected, pending window discarded");
            }
            return None;
        }

        // Only one value can disagree with the confirmed one, so an open
        // window is always a window for `raw`.
        let since = match self.state.pending_since {
            Some(since) => since,
            None => {
                self.state.pending_crying = Some(raw);
                self.state.pending_since = Some(now);
                debug!(raw, %now, "pending window opened");
                now
            }
        };

        if now - since < self.debounce {
            return None;
        }

        Some(self.confirm(raw, now))
    }

    /// Whether a snapshot predates the last confirmed transition
    pub fn is_stale(&self, snapshot: &Snapshot) -> bool {
        self.state
            .last_confirmed_at
            .is_some_and(|last| snapshot.observed_at < last)
    }

    fn confirm(&mut self, crying: bool, at: DateTime<Utc>) -> TransitionEvent {
        self.state.confirmed_crying = crying;
        self.state.clear_pending();
        self.state.last_confirmed_at = Some(at);

        let event = if crying {
            TransitionEvent::Started { at }
        } else {
            TransitionEvent::Stopped { at }
        };
        debug!(?event, "transition confirmed");
        event
    }

    /// Current monitor state
    pub fn monitor_state(&self) -> MonitorState {
        self.state.monitor_state()
    }

    /// Read-only view of the tracker state
    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Configured debounce threshold
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Forget all history (listener re-subscription)
    pub fn reset(&mut self) {
        self.state = TrackerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 2, 0, 0).unwrap()
    }

    fn snap(crying: bool, offset_ms: i64) -> Snapshot {
        Snapshot {
            temperature: 21.0,
            humidity: 40.0,
            is_crying: crying,
            observed_at: t0() + Duration::milliseconds(offset_ms),
            sequence: None,
        }
    }

    fn tracker() -> DebouncedStateTracker {
        DebouncedStateTracker::new(Duration::seconds(2))
    }

    #[test]
    fn test_calm_stays_calm() {
        let mut tracker = tracker();
        assert_eq!(tracker.update(&snap(false, 0)), None);
        assert_eq!(tracker.update(&snap(false, 5_000)), None);
        assert_eq!(tracker.monitor_state(), MonitorState::Calm);
    }

    #[test]
    fn test_started_after_threshold() {
        let mut tracker = tracker();
        assert_eq!(tracker.update(&snap(true, 0)), None);
        assert_eq!(tracker.monitor_state(), MonitorState::PendingCry);
        assert_eq!(tracker.update(&snap(true, 1_000)), None);

        let event = tracker.update(&snap(true, 2_100));
        assert_eq!(
            event,
            Some(TransitionEvent::Started {
                at: t0() + Duration::milliseconds(2_100)
            })
        );
        assert_eq!(tracker.monitor_state(), MonitorState::Crying);
        assert_eq!(tracker.state().pending_crying, None);
        assert_eq!(tracker.state().pending_since, None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut tracker = tracker();
        tracker.update(&snap(true, 0));
        assert!(tracker.update(&snap(true, 2_000)).is_some());
    }

    #[test]
    fn test_flap_rejected() {
        let mut tracker = tracker();
        tracker.update(&snap(true, 0));
        assert_eq!(tracker.update(&snap(false, 500)), None);
        assert_eq!(tracker.monitor_state(), MonitorState::Calm);

        // window restarts from the next true reading
        assert_eq!(tracker.update(&snap(true, 2_500)), None);
        assert_eq!(tracker.update(&snap(true, 4_000)), None);
        assert!(tracker.update(&snap(true, 4_500)).is_some());
    }

    #[test]
    fn test_stopped_after_threshold() {
        let mut tracker = tracker();
        tracker.update(&snap(true, 0));
        tracker.update(&snap(true, 2_000));

        assert_eq!(tracker.update(&snap(false, 5_000)), None);
        assert_eq!(tracker.monitor_state(), MonitorState::PendingCalm);
        let event = tracker.update(&snap(false, 7_500));
        assert!(matches!(event, Some(TransitionEvent::Stopped { .. })));
        assert_eq!(tracker.monitor_state(), MonitorState::Calm);
    }

    #[test]
    fn test_stale_snapshot_ignored() {
        let mut tracker = tracker();
        tracker.update(&snap(true, 0));
        tracker.update(&snap(true, 2_000));

        // delayed calm readings from before the confirmation
        assert!(tracker.is_stale(&snap(false, 1_000)));
        assert_eq!(tracker.update(&snap(false, 1_000)), None);
        assert_eq!(tracker.monitor_state(), MonitorState::Crying);
    }

    #[test]
    fn test_older_snapshot_does_not_extend_window() {
        let mut tracker = tracker();
        tracker.update(&snap(true, 1_000));
        // arrives late, claims an earlier start
        assert_eq!(tracker.update(&snap(true, 0)), None);
        assert_eq!(tracker.state().pending_since, Some(t0() + Duration::seconds(1)));
        assert_eq!(tracker.update(&snap(true, 2_500)), None);
        assert!(tracker.update(&snap(true, 3_000)).is_some());
    }

    #[test]
    fn test_metric_only_updates_never_transition() {
        let mut tracker = tracker();
        for i in 0..10 {
            let mut s = snap(false, i * 1_000);
            s.temperature = 18.0 + i as f64;
            s.humidity = 30.0 + i as f64;
            assert_eq!(tracker.update(&s), None);
        }
    }

    #[test]
    fn test_zero_debounce_is_edge_triggered() {
        let mut tracker = DebouncedStateTracker::new(Duration::zero());
        assert!(tracker.update(&snap(true, 0)).is_some());
        assert!(tracker.update(&snap(false, 10)).is_some());
    }

    #[test]
    fn test_reset() {
        let mut tracker = tracker();
        tracker.update(&snap(true, 0));
        tracker.update(&snap(true, 2_000));
        tracker.reset();
        assert_eq!(tracker.state(), &TrackerState::default());
    }

    proptest! {
        #[test]
        fn prop_short_blip_never_starts(blip_ms in 0i64..2_000, calm_gap_ms in 1i64..60_000) {
            let mut tracker = tracker();
            prop_assert_eq!(tracker.update(&snap(true, 0)), None);
            prop_assert_eq!(tracker.update(&snap(true, blip_ms)), None);
            prop_assert_eq!(tracker.update(&snap(false, blip_ms + calm_gap_ms)), None);
            prop_assert_eq!(tracker.monitor_state(), MonitorState::Calm);
        }

        #[test]
        fn prop_pending_never_equals_confirmed(readings in proptest::collection::vec((any::<bool>(), 0i64..5_000), 1..50)) {
            let mut tracker = tracker();
            for (crying, offset) in readings {
                tracker.update(&snap(crying, offset));
                let state = tracker.state();
                if let Some(pending) = state.pending_crying {
                    prop_assert_ne!(pending, state.confirmed_crying);
                    prop_assert!(state.pending_since.is_some());
                } else {
                    prop_assert!(state.pending_since.is_none());
                }
            }
        }

        #[test]
        fn prop_stale_snapshots_never_transition(crying in any::<bool>(), back_ms in 1i64..10_000) {
            let mut tracker = tracker();
            tracker.update(&snap(true, 20_000));
            tracker.update(&snap(true, 22_000));
            prop_assert_eq!(tracker.monitor_state(), MonitorState::Crying);

            prop_assert_eq!(tracker.update(&snap(crying, 22_000 - back_ms)), None);
            prop_assert_eq!(tracker.monitor_state(), MonitorState::Crying);
        }
    }
}
