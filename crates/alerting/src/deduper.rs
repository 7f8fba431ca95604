//! Alert Deduper Implementation

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Logical identity of one crying episode
///
/// Millisecond timestamp of the confirmation that started the episode. Only
/// one Started can be confirmed per debounce window, so this is unique per
/// feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeKey(i64);

impl EpisodeKey {
    /// Derive the key from a Started confirmation time
    pub fn from_confirmation(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis())
    }

    /// Milliseconds since the Unix epoch
    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "episode-{}", self.0)
    }
}

/// One confirmed crying episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEpisode {
    /// Stable episode identity
    pub episode_id: EpisodeKey,
    /// When the episode was confirmed
    pub started_at: DateTime<Utc>,
    /// Whether the alert for this episode was claimed; never reverts
    pub alerted: bool,
    /// When calm was confirmed, `None` while the episode is open
    pub stopped_at: Option<DateTime<Utc>>,
    /// Latest time this episode was looked up, drives eviction
    pub last_seen: DateTime<Utc>,
}

impl AlertEpisode {
    /// Claimed and not yet stopped
    pub fn is_open(&self) -> bool {
        self.alerted && self.stopped_at.is_none()
    }
}

impl fmt::Display for AlertEpisode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (alerted: {}", self.episode_id, self.alerted)?;
        if let Some(stopped_at) = self.stopped_at {
            write!(f, ", stopped: {}", stopped_at)?;
        }
        write!(f, ")")
    }
}

/// Alert deduper guaranteeing at most one alert per episode
///
/// Entries, closed ones included, are evicted once `ttl` has passed since
/// they were last seen. Within the TTL a claimed episode is never claimed
/// again, even after it stopped; past it, a replayed Started for the same
/// episode may alert a second time. A new episode always has a new key.
#[derive(Debug)]
pub struct AlertDeduper {
    /// Retention window
    ttl: Duration,
    /// Remembered episodes by key
    episodes: HashMap<EpisodeKey, AlertEpisode>,
}

impl AlertDeduper {
    /// Create a new deduper with the given retention window
    pub fn new(ttl: Duration) -> Self {
        info!("Creating alert deduper with ttl: {}ms", ttl.num_milliseconds());
        Self {
            ttl,
            episodes: HashMap::new(),
        }
    }

    /// Claim the alert for an episode
    ///
    /// Returns true the first time it is called for `key` and false on every
    /// later call while the key is retained.
    pub fn should_alert(&mut self, key: EpisodeKey, now: DateTime<Utc>) -> bool {
        self.evict_expired(now);

        let episode = self.episodes.entry(key).or_insert_with(|| AlertEpisode {
            episode_id: key,
            started_at: now,
            alerted: false,
            stopped_at: None,
            last_seen: now,
        });
        episode.last_seen = episode.last_seen.max(now);

        if episode.alerted {
            debug!("Alert suppressed: {} already alerted", key);
            return false;
        }

        episode.alerted = true;
        info!("Alert claimed: {}", key);
        true
    }

    /// Claimed episode whose span contains `at`, if any
    ///
    /// An episode spans from its confirmation up to, not including, its
    /// stop; an open episode has no end yet. Replayed history that confirms
    /// crying again inside that span belongs to the same episode. Refreshes
    /// the retention of the episode found.
    pub fn claimed_episode_at(&mut self, at: DateTime<Utc>) -> Option<EpisodeKey> {
        self.evict_expired(at);

        let episode = self
            .episodes
            .values_mut()
            .filter(|episode| {
                episode.alerted
                    && episode.started_at <= at
                    && episode.stopped_at.map_or(true, |stopped_at| at < stopped_at)
            })
            .max_by_key(|episode| episode.started_at)?;
        episode.last_seen = episode.last_seen.max(at);
        Some(episode.episode_id)
    }

    /// Record the end of an episode
    ///
    /// The episode stays claimed until it expires, so a replay of the same
    /// history does not alert again. Returns the closed episode, or `None`
    /// if it was unknown or evicted.
    pub fn record_stopped(&mut self, key: EpisodeKey, now: DateTime<Utc>) -> Option<AlertEpisode> {
        self.evict_expired(now);

        let closed = self.episodes.get_mut(&key).map(|episode| {
            episode.stopped_at.get_or_insert(now);
            episode.last_seen = episode.last_seen.max(now);
            episode.clone()
        });

        match &closed {
            Some(episode) => info!("Episode closed: {}", episode),
            None => debug!("Stop recorded for unknown episode {}", key),
        }
        closed
    }

    /// Evict entries not seen within the TTL
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.episodes.len();
        self.episodes.retain(|_, episode| now - episode.last_seen <= ttl);

        let evicted = before - self.episodes.len();
        if evicted > 0 {
            debug!("Evicted {} expired episodes", evicted);
        }
        evicted
    }

    /// Look up an episode
    pub fn episode(&self, key: EpisodeKey) -> Option<&AlertEpisode> {
        self.episodes.get(&key)
    }

    /// Claimed episodes not yet stopped, oldest first
    pub fn open_episodes(&self) -> Vec<&AlertEpisode> {
        let mut open: Vec<_> = self
            .episodes
            .values()
            .filter(|episode| episode.is_open())
            .collect();
        open.sort_by_key(|episode| episode.episode_id);
        open
    }

    /// Number of retained episodes
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Retention window
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
