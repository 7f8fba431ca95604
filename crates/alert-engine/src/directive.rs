//! Engine outputs: alert directives and display state

use alerting::EpisodeKey;
use chrono::{DateTime, Utc};
use cry_tracker::MonitorState;
use data_validator::Snapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDirective {
    pub alert_id: Uuid,
    pub feed_id: String,
    pub episode: EpisodeKey,
    pub temperature: f64,
    pub humidity: f64,
    pub title: String,
    pub body: String,
    /// Confirmation time of the crying episode
    pub raised_at: DateTime<Utc>,
}

impl AlertDirective {
    /// Render an alert from the snapshot that confirmed the episode
    ///
    /// Sinks only see the title and body, so the title names the feed.
    pub fn render(
        feed_id: &str,
        episode: EpisodeKey,
        snapshot: &Snapshot,
        title: &str,
        raised_at: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            feed_id: feed_id.to_string(),
            episode,
            temperature: snapshot.temperature,
            humidity: snapshot.humidity,
            title: format!("{} ({})", title, feed_id),
            body: format!(
                "Baby is crying! Temp: {:.1}°C, Humidity: {:.1}%",
                snapshot.temperature, snapshot.humidity
            ),
            raised_at,
        }
    }
}

/// What a monitoring screen shows for one feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    /// Confirmed crying flag
    pub crying: bool,
    pub state: MonitorState,
    /// Observation time of the snapshot the readings came from
    pub observed_at: Option<DateTime<Utc>>,
    pub sequence: Option<u64>,
    pub last_alert_at: Option<DateTime<Utc>>,
    pub snapshots_accepted: u64,
    pub snapshots_rejected: u64,
}

impl DisplayState {
    /// Take the readings of a snapshot
    pub(crate) fn observe_metrics(&mut self, snapshot: &Snapshot) {
        self.temperature = Some(snapshot.temperature);
        self.humidity = Some(snapshot.humidity);
        self.observed_at = Some(snapshot.observed_at);
        self.sequence = snapshot.sequence;
    }

    /// Status line as shown on the monitor card
    pub fn status_label(&self) -> &'static str {
        if self.crying {
            "Baby is crying!"
        } else {
            "Baby is calm"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_body() {
        let at = Utc.with_ymd_and_hms(2026, 6, 1, 22, 10, 0).unwrap();
        let snapshot = Snapshot {
            temperature: 23.46,
            humidity: 41.0,
            is_crying: true,
            observed_at: at,
            sequence: Some(4),
        };

        let directive = AlertDirective::render(
            "nursery",
            EpisodeKey::from_confirmation(at),
            &snapshot,
            "Baby alert",
            at,
        );
        assert_eq!(directive.feed_id, "nursery");
        assert_eq!(directive.title, "Baby alert (nursery)");
        assert_eq!(directive.body, "Baby is crying! Temp: 23.5°C, Humidity: 41.0%");
        assert_eq!(directive.raised_at, at);
    }

    #[test]
    fn test_status_label() {
        let mut display = DisplayState::default();
        assert_eq!(display.status_label(), "Baby is calm");
        display.crying = true;
        assert_eq!(display.status_label(), "Baby is crying!");
    }
}
