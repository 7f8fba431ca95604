//! Alert Transition Engine Implementation

use alerting::{AlertDeduper, AlertEpisode, EpisodeKey};
use chrono::{DateTime, Utc};
use cry_tracker::{DebouncedStateTracker, MonitorState, TrackerState, TransitionEvent};
use data_validator::{RawSnapshot, Snapshot, ValidationError, Validator};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::config::{ConfigurationError, EngineConfig, EngineSettings, StaleSnapshotPolicy};
use crate::directive::{AlertDirective, DisplayState};

/// Alert engine for a single feed
///
/// Owns the tracker and deduper state for its feed. Callers must serialize
/// `ingest` calls; [`MonitorHub`](crate::MonitorHub) does this per feed.
pub struct AlertTransitionEngine {
    feed_id: String,
    settings: EngineSettings,
    validator: Validator,
    tracker: DebouncedStateTracker,
    deduper: AlertDeduper,
    /// Key of the crying episode awaiting its Stopped transition
    open_episode: Option<EpisodeKey>,
    display: DisplayState,
}

impl AlertTransitionEngine {
    /// Create a new engine, failing fast on invalid configuration
    pub fn new(feed_id: impl Into<String>, config: &EngineConfig) -> Result<Self, ConfigurationError> {
        Ok(Self::with_settings(feed_id, config.validate()?))
    }

    /// Create a new engine from already validated settings
    pub fn with_settings(feed_id: impl Into<String>, settings: EngineSettings) -> Self {
        let feed_id = feed_id.into();
        info!(
            "Creating alert engine for feed {} (debounce: {}ms, dedup ttl: {}ms)",
            feed_id,
            settings.debounce_threshold.num_milliseconds(),
            settings.dedup_ttl.num_milliseconds()
        );
        Self {
            validator: Validator::new(settings.validation.clone()),
            tracker: DebouncedStateTracker::new(settings.debounce_threshold),
            deduper: AlertDeduper::new(settings.dedup_ttl),
            open_episode: None,
            display: DisplayState::default(),
            feed_id,
            settings,
        }
    }

    /// Validate and process a raw feed document
    ///
    /// A malformed document is logged and returned as an error; tracker
    /// state is left untouched.
    pub fn ingest(&mut self, raw: &RawSnapshot) -> Result<Option<AlertDirective>, ValidationError> {
        counter!("monitor_snapshots_total", "feed" => self.feed_id.clone()).increment(1);

        let snapshot = match self.validator.validate(raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(feed = %self.feed_id, error = %e, "snapshot rejected");
                counter!("monitor_snapshots_rejected_total", "feed" => self.feed_id.clone())
                    .increment(1);
                self.display.snapshots_rejected += 1;
                return Err(e);
            }
        };

        Ok(self.ingest_snapshot(&snapshot))
    }

    /// Process an already validated snapshot
    pub fn ingest_snapshot(&mut self, snapshot: &Snapshot) -> Option<AlertDirective> {
        self.display.snapshots_accepted += 1;

        let stale = self.tracker.is_stale(snapshot);
        if !stale || self.settings.stale_snapshot_policy == StaleSnapshotPolicy::UpdateMetricsOnly {
            self.display.observe_metrics(snapshot);
        }

        let directive = match self.tracker.update(snapshot) {
            Some(TransitionEvent::Started { at }) => self.on_started(snapshot, at),
            Some(TransitionEvent::Stopped { at }) => {
                self.on_stopped(at);
                None
            }
            None => None,
        };

        self.display.crying = self.tracker.state().confirmed_crying;
        self.display.state = self.tracker.monitor_state();
        directive
    }

    fn on_started(&mut self, snapshot: &Snapshot, at: DateTime<Utc>) -> Option<AlertDirective> {
        // Replayed history, whole or partial, confirms crying again inside
        // an episode that was already alerted.
        if let Some(claimed) = self.deduper.claimed_episode_at(at) {
            debug!(feed = %self.feed_id, %claimed, "crying confirmed, alert already claimed");
            self.open_episode = Some(claimed);
            return None;
        }

        let key = EpisodeKey::from_confirmation(at);
        self.open_episode = Some(key);
        if !self.deduper.should_alert(key, at) {
            return None;
        }

        counter!("monitor_alerts_claimed_total", "feed" => self.feed_id.clone()).increment(1);
        info!(feed = %self.feed_id, %key, "crying confirmed, raising alert");
        self.display.last_alert_at = Some(at);

        Some(AlertDirective::render(
            &self.feed_id,
            key,
            snapshot,
            &self.settings.alert_title,
            at,
        ))
    }

    fn on_stopped(&mut self, at: DateTime<Utc>) {
        match self.open_episode.take() {
            Some(key) => {
                info!(feed = %self.feed_id, %key, "calm confirmed");
                self.deduper.record_stopped(key, at);
            }
            None => debug!(feed = %self.feed_id, "calm confirmed with no open episode"),
        }
    }

    /// Forget tracker history while keeping alert claims
    ///
    /// Used when the feed subscription is re-established and the source is
    /// about to replay recent snapshots.
    pub fn reset_tracker(&mut self) {
        info!(feed = %self.feed_id, "tracker reset");
        self.tracker.reset();
    }

    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// Current display state
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.tracker.monitor_state()
    }

    /// Read-only view of the tracker state
    pub fn tracker_state(&self) -> &TrackerState {
        self.tracker.state()
    }

    /// Claimed episodes still waiting for calm
    pub fn open_episodes(&self) -> Vec<&AlertEpisode> {
        self.deduper.open_episodes()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(offset_ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 9, 1, 0, 0).unwrap() + Duration::milliseconds(offset_ms)
    }

    fn reading(crying: bool, offset_ms: i64) -> RawSnapshot {
        RawSnapshot::reading(22.0, 48.0, crying, t(offset_ms))
    }

    fn engine(config: EngineConfig) -> AlertTransitionEngine {
        AlertTransitionEngine::new("nursery", &config).unwrap()
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = EngineConfig {
            debounce_threshold_ms: -10,
            ..Default::default()
        };
        assert!(AlertTransitionEngine::new("nursery", &config).is_err());
    }

    #[test]
    fn test_directive_carries_metrics() {
        let mut engine = engine(EngineConfig::default());
        engine.ingest(&reading(true, 0)).unwrap();
        let directive = engine
            .ingest(&RawSnapshot::reading(24.5, 52.0, true, t(2_000)))
            .unwrap()
            .unwrap();

        assert_eq!(directive.temperature, 24.5);
        assert_eq!(directive.humidity, 52.0);
        assert_eq!(directive.episode, EpisodeKey::from_confirmation(t(2_000)));
        assert_eq!(engine.display().last_alert_at, Some(t(2_000)));
        assert!(engine.display().crying);
        assert_eq!(engine.display().state, MonitorState::Crying);
    }

    #[test]
    fn test_rejected_snapshot_counted() {
        let mut engine = engine(EngineConfig::default());
        assert!(engine.ingest(&RawSnapshot::default()).is_err());
        assert_eq!(engine.display().snapshots_rejected, 1);
        assert_eq!(engine.display().snapshots_accepted, 0);
    }

    #[test]
    fn test_stale_snapshot_updates_metrics_only() {
        let mut engine = engine(EngineConfig::default());
        engine.ingest(&reading(true, 0)).unwrap();
        engine.ingest(&reading(true, 2_000)).unwrap();

        let late = RawSnapshot::reading(19.0, 30.0, false, t(1_000));
        assert_eq!(engine.ingest(&late).unwrap(), None);
        assert_eq!(engine.display().temperature, Some(19.0));
        assert_eq!(engine.monitor_state(), MonitorState::Crying);
    }

    #[test]
    fn test_stale_snapshot_ignored_entirely() {
        let mut engine = engine(EngineConfig {
            stale_snapshot_policy: StaleSnapshotPolicy::Ignore,
            ..Default::default()
        });
        engine.ingest(&reading(true, 0)).unwrap();
        engine.ingest(&reading(true, 2_000)).unwrap();

        let late = RawSnapshot::reading(19.0, 30.0, false, t(1_000));
        assert_eq!(engine.ingest(&late).unwrap(), None);
        assert_eq!(engine.display().temperature, Some(22.0));
        assert_eq!(engine.display().observed_at, Some(t(2_000)));
    }

    #[test]
    fn test_replayed_closed_episode_not_realerted() {
        let mut engine = engine(EngineConfig::default());
        let history = [
            reading(false, -1_000),
            reading(true, 0),
            reading(true, 1_000),
            reading(true, 2_100),
            reading(false, 5_000),
            reading(false, 7_100),
        ];

        let first = history
            .iter()
            .filter_map(|raw| engine.ingest(raw).unwrap())
            .count();
        assert_eq!(first, 1);

        engine.reset_tracker();
        let replayed = history
            .iter()
            .filter_map(|raw| engine.ingest(raw).unwrap())
            .count();
        assert_eq!(replayed, 0);
        assert_eq!(engine.monitor_state(), MonitorState::Calm);
        assert!(engine.open_episodes().is_empty());
    }

    #[test]
    fn test_partial_replay_of_open_episode_not_realerted() {
        let mut engine = engine(EngineConfig::default());
        engine.ingest(&reading(true, 0)).unwrap();
        engine.ingest(&reading(true, 1_000)).unwrap();
        assert!(engine.ingest(&reading(true, 2_100)).unwrap().is_some());

        engine.reset_tracker();
        for offset in [1_000, 2_100, 3_100] {
            assert_eq!(engine.ingest(&reading(true, offset)).unwrap(), None);
        }
        assert_eq!(engine.monitor_state(), MonitorState::Crying);

        // the original episode is still the one awaiting calm
        let open = engine.open_episodes();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].episode_id, EpisodeKey::from_confirmation(t(2_100)));
    }

    #[test]
    fn test_new_episode_after_calm_alerts() {
        let mut engine = engine(EngineConfig::default());
        engine.ingest(&reading(true, 0)).unwrap();
        assert!(engine.ingest(&reading(true, 2_000)).unwrap().is_some());
        engine.ingest(&reading(false, 3_000)).unwrap();
        engine.ingest(&reading(false, 5_000)).unwrap();

        engine.ingest(&reading(true, 6_000)).unwrap();
        assert!(engine.ingest(&reading(true, 8_000)).unwrap().is_some());
    }

    #[test]
    fn test_stop_closes_episode() {
        let mut engine = engine(EngineConfig::default());
        engine.ingest(&reading(true, 0)).unwrap();
        engine.ingest(&reading(true, 2_000)).unwrap();
        assert_eq!(engine.open_episodes().len(), 1);

        engine.ingest(&reading(false, 3_000)).unwrap();
        engine.ingest(&reading(false, 5_000)).unwrap();
        assert!(engine.open_episodes().is_empty());
        assert_eq!(engine.monitor_state(), MonitorState::Calm);
    }
}
