//! Engine configuration

use chrono::Duration;
use data_validator::ValidationConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default sustained-signal window before a transition is confirmed
pub const DEFAULT_DEBOUNCE_THRESHOLD_MS: i64 = 2_000;

/// Dedup TTL as a multiple of the debounce threshold when not set
pub const DEFAULT_DEDUP_TTL_FACTOR: i64 = 5;

/// Most feeds tracked at once
pub const DEFAULT_MAX_FEEDS: usize = 256;

/// Feeds without a snapshot for this long are dropped (seconds)
pub const DEFAULT_FEED_IDLE_SECS: i64 = 3_600;

/// Rejected engine configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{field} must not be negative, got {value}ms")]
    NegativeDuration { field: &'static str, value: i64 },

    #[error("dedup_ttl_ms ({ttl_ms}) must cover debounce_threshold_ms ({threshold_ms})")]
    TtlBelowThreshold { ttl_ms: i64, threshold_ms: i64 },

    #[error("{field} range is empty: [{min}, {max}]")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("alert_title must not be empty")]
    EmptyTitle,

    #[error("max_feeds must be at least 1")]
    NoFeedCapacity,

    #[error("feed_idle_secs ({idle_secs}s) must cover dedup_ttl_ms ({ttl_ms})")]
    IdleBelowTtl { idle_secs: i64, ttl_ms: i64 },
}

/// What to do with snapshots older than the last confirmed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleSnapshotPolicy {
    /// Drop them entirely
    Ignore,
    /// Show their readings, skip transition detection
    #[default]
    UpdateMetricsOnly,
}

/// Engine configuration as read from file or environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sustained-signal window before a transition is confirmed (milliseconds)
    pub debounce_threshold_ms: i64,

    /// Alert claim retention (milliseconds); defaults to 5x the debounce threshold
    pub dedup_ttl_ms: Option<i64>,

    /// Handling of snapshots older than the last confirmed transition
    pub stale_snapshot_policy: StaleSnapshotPolicy,

    /// Notification title
    pub alert_title: String,

    /// Reading ranges accepted from the feed
    pub validation: ValidationConfig,

    /// Most feeds tracked at once; the least recently observed is dropped
    pub max_feeds: usize,

    /// Drop feeds whose newest snapshot is older than this (seconds)
    pub feed_idle_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_threshold_ms: DEFAULT_DEBOUNCE_THRESHOLD_MS,
            dedup_ttl_ms: None,
            stale_snapshot_policy: StaleSnapshotPolicy::default(),
            alert_title: "Baby alert".to_string(),
            validation: ValidationConfig::default(),
            max_feeds: DEFAULT_MAX_FEEDS,
            feed_idle_secs: DEFAULT_FEED_IDLE_SECS,
        }
    }
}

impl EngineConfig {
    /// Create edge-triggered config (alert on the first crying snapshot)
    pub fn edge_triggered() -> Self {
        Self {
            debounce_threshold_ms: 0,
            dedup_ttl_ms: Some(10_000),
            ..Default::default()
        }
    }

    /// Check the configuration and resolve defaults
    pub fn validate(&self) -> Result<EngineSettings, ConfigurationError> {
        let threshold_ms = self.debounce_threshold_ms;
        if threshold_ms < 0 {
            return Err(ConfigurationError::NegativeDuration {
                field: "debounce_threshold_ms",
                value: threshold_ms,
            });
        }

        let ttl_ms = self
            .dedup_ttl_ms
            .unwrap_or_else(|| threshold_ms.saturating_mul(DEFAULT_DEDUP_TTL_FACTOR));
        if ttl_ms < 0 {
            return Err(ConfigurationError::NegativeDuration {
                field: "dedup_ttl_ms",
                value: ttl_ms,
            });
        }
        if ttl_ms < threshold_ms {
            return Err(ConfigurationError::TtlBelowThreshold {
                ttl_ms,
                threshold_ms,
            });
        }

        for (field, (min, max)) in [
            ("temperature", self.validation.temperature_range),
            ("humidity", self.validation.humidity_range),
        ] {
            if !(min <= max) {
                return Err(ConfigurationError::InvalidRange { field, min, max });
            }
        }

        let alert_title = self.alert_title.trim();
        if alert_title.is_empty() {
            return Err(ConfigurationError::EmptyTitle);
        }

        if self.max_feeds == 0 {
            return Err(ConfigurationError::NoFeedCapacity);
        }
        // a dropped feed forgets its alert claims
        if self.feed_idle_secs.saturating_mul(1_000) < ttl_ms {
            return Err(ConfigurationError::IdleBelowTtl {
                idle_secs: self.feed_idle_secs,
                ttl_ms,
            });
        }

        Ok(EngineSettings {
            debounce_threshold: Duration::milliseconds(threshold_ms),
            dedup_ttl: Duration::milliseconds(ttl_ms),
            stale_snapshot_policy: self.stale_snapshot_policy,
            alert_title: alert_title.to_string(),
            validation: self.validation.clone(),
            max_feeds: self.max_feeds,
            feed_idle_timeout: Duration::try_seconds(self.feed_idle_secs).unwrap_or(Duration::MAX),
        })
    }
}

/// Validated engine settings
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub debounce_threshold: Duration,
    pub dedup_ttl: Duration,
    pub stale_snapshot_policy: StaleSnapshotPolicy,
    pub alert_title: String,
    pub validation: ValidationConfig,
    pub max_feeds: usize,
    pub feed_idle_timeout: Duration,
}
