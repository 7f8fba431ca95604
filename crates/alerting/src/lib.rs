//! Alerting System
//!
//! Provides per-episode alert deduplication and the notification delivery
//! boundary.

mod deduper;
mod sink;

pub use deduper::{AlertDeduper, AlertEpisode, EpisodeKey};
pub use sink::{DeliveryError, NotificationSink, TracingSink};
