//! Cloud Synchronization Module
//!
//! MQTT transport for the monitor:
//! - Snapshot subscription on `{prefix}/{feed}/snapshot`
//! - Alert publishing on `{prefix}/alerts`
//! - Re-subscription after broker reconnects

use alert_engine::{DeliveryError, FeedSnapshot, NotificationSink, RawSnapshot, SnapshotSource};
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Requests buffered between the client and the event loop
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Cloud sync error types
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Source already subscribed")]
    AlreadySubscribed,

    #[error("Unexpected topic: {0}")]
    UnexpectedTopic(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// MQTT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker host
    pub broker_url: String,
    /// MQTT port
    pub broker_port: u16,
    /// Client id presented to the broker
    pub client_id: String,
    /// Topic root shared by all feeds
    pub topic_prefix: String,
    /// Keep-alive interval (seconds)
    pub keep_alive_secs: u64,
    /// Pause before polling again after a connection error (seconds)
    pub reconnect_delay_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: "localhost".to_string(),
            broker_port: 1883,
            client_id: "baby-monitor".to_string(),
            topic_prefix: "babies".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_secs: 5,
        }
    }
}

impl MqttConfig {
    /// Wildcard filter matching every feed's snapshot topic
    pub fn snapshot_filter(&self) -> String {
        format!("{}/+/snapshot", self.topic_prefix)
    }

    /// Topic alerts are published on
    pub fn alert_topic(&self) -> String {
        format!("{}/alerts", self.topic_prefix)
    }
}

/// Alert message published to the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub message_type: String,
    pub message_id: Uuid,
    pub sent_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// Extract the feed id from `{prefix}/{feed}/snapshot`
pub fn feed_id_from_topic<'a>(prefix: &str, topic: &'a str) -> Option<&'a str> {
    let feed_id = topic
        .strip_prefix(prefix)?
        .strip_prefix('/')?
        .strip_suffix("/snapshot")?;

    if feed_id.is_empty() || feed_id.contains('/') {
        None
    } else {
        Some(feed_id)
    }
}

/// Decode an incoming publish into a feed snapshot
pub fn decode_publish(prefix: &str, topic: &str, payload: &[u8]) -> Result<FeedSnapshot, CloudError> {
    let feed_id = feed_id_from_topic(prefix, topic)
        .ok_or_else(|| CloudError::UnexpectedTopic(topic.to_string()))?;
    let snapshot =
        RawSnapshot::from_slice(payload).map_err(|e| CloudError::Serialization(e.to_string()))?;

    Ok(FeedSnapshot {
        feed_id: feed_id.to_string(),
        snapshot,
    })
}

/// Snapshot source backed by an MQTT subscription
pub struct MqttSnapshotSource {
    config: MqttConfig,
    client: AsyncClient,
    eventloop: Option<EventLoop>,
}

impl MqttSnapshotSource {
    /// Create the client; nothing connects until [`subscribe`](SnapshotSource::subscribe)
    pub fn new(config: MqttConfig) -> Self {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_url.clone(),
            config.broker_port,
        );
        options.set_keep_alive(std::time::Duration::from_secs(config.keep_alive_secs));

        let (client, eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
        Self {
            config,
            client,
            eventloop: Some(eventloop),
        }
    }

    /// Sink publishing alerts through this source's connection
    pub fn notification_sink(&self) -> MqttNotificationSink {
        MqttNotificationSink {
            client: self.client.clone(),
            topic: self.config.alert_topic(),
        }
    }
}

impl SnapshotSource for MqttSnapshotSource {
    type Error = CloudError;

    fn subscribe(&mut self, tx: mpsc::Sender<FeedSnapshot>) -> Result<(), CloudError> {
        let mut eventloop = self.eventloop.take().ok_or(CloudError::AlreadySubscribed)?;
        let client = self.client.clone();
        let filter = self.config.snapshot_filter();
        let prefix = self.config.topic_prefix.clone();
        let reconnect_delay = std::time::Duration::from_secs(self.config.reconnect_delay_secs);

        info!(
            "Subscribing to {} on {}:{}",
            filter, self.config.broker_url, self.config.broker_port
        );

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // clean sessions drop subscriptions on every reconnect
                        info!("Connected to MQTT broker, subscribing to {}", filter);
                        if let Err(e) = client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                            error!("MQTT subscribe failed: {}", e);
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match decode_publish(&prefix, &publish.topic, &publish.payload) {
                            Ok(snapshot) => {
                                if tx.send(snapshot).await.is_err() {
                                    info!("Snapshot receiver dropped, stopping MQTT source");
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping MQTT message on {}: {}", publish.topic, e),
                        }
                    }
                    Ok(event) => {
                        debug!("MQTT event: {:?}", event);
                    }
                    Err(e) => {
                        error!("MQTT error: {}", e);
                        tokio::time::sleep(reconnect_delay).await;
                    }
                }
            }
        });

        Ok(())
    }
}

/// Notification sink publishing alerts over MQTT
pub struct MqttNotificationSink {
    client: AsyncClient,
    topic: String,
}

impl NotificationSink for MqttNotificationSink {
    fn notify(&self, title: &str, body: &str) -> Result<(), DeliveryError> {
        let message = AlertMessage {
            message_type: "alert".to_string(),
            message_id: Uuid::new_v4(),
            sent_at: Utc::now(),
            title: title.to_string(),
            body: body.to_string(),
        };

        let payload = serde_json::to_vec(&message)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        // queued for the event loop, never awaits the broker
        self.client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)
            .map_err(|e| match e {
                ClientError::TryRequest(_) => {
                    DeliveryError::Unavailable("MQTT request queue full or closed".to_string())
                }
                other => DeliveryError::Transport(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_id_from_topic() {
        assert_eq!(feed_id_from_topic("babies", "babies/nursery/snapshot"), Some("nursery"));
        assert_eq!(feed_id_from_topic("babies", "babies//snapshot"), None);
        assert_eq!(feed_id_from_topic("babies", "babies/a/b/snapshot"), None);
        assert_eq!(feed_id_from_topic("babies", "babies/nursery/alerts"), None);
        assert_eq!(feed_id_from_topic("babies", "other/nursery/snapshot"), None);
    }

    #[test]
    fn test_decode_publish() {
        let payload = br#"{
            "environment": { "temperature": 21.0, "humidity": 39.5 },
            "babyStatus": { "isCrying": false },
            "observedAt": "2026-04-02T06:00:00Z"
        }"#;

        let feed = decode_publish("babies", "babies/nursery/snapshot", payload).unwrap();
        assert_eq!(feed.feed_id, "nursery");
        assert_eq!(feed.snapshot.humidity(), Some(39.5));
        assert_eq!(feed.snapshot.is_crying(), Some(false));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(
            decode_publish("babies", "babies/nursery/status", b"{}"),
            Err(CloudError::UnexpectedTopic(_))
        ));
        assert!(matches!(
            decode_publish("babies", "babies/nursery/snapshot", b"[1, 2"),
            Err(CloudError::Serialization(_))
        ));
    }

    #[test]
    fn test_topics() {
        let config = MqttConfig::default();
        assert_eq!(config.snapshot_filter(), "babies/+/snapshot");
        assert_eq!(config.alert_topic(), "babies/alerts");
    }

    #[tokio::test]
    async fn test_sink_queues_without_connection() {
        let source = MqttSnapshotSource::new(MqttConfig::default());
        let sink = source.notification_sink();
        assert!(sink.notify("Baby alert", "Baby is crying!").is_ok());
    }

    #[tokio::test]
    async fn test_sink_unavailable_when_queue_full() {
        let source = MqttSnapshotSource::new(MqttConfig::default());
        let sink = source.notification_sink();

        // nothing drains the queue until the source is subscribed
        for _ in 0..REQUEST_QUEUE_CAPACITY {
            assert!(sink.notify("Baby alert (nursery)", "Baby is crying!").is_ok());
        }
        assert!(matches!(
            sink.notify("Baby alert (nursery)", "Baby is crying!"),
            Err(DeliveryError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_twice_fails() {
        let mut source = MqttSnapshotSource::new(MqttConfig {
            broker_port: 1,
            reconnect_delay_secs: 60,
            ..Default::default()
        });
        let (tx, _rx) = mpsc::channel(1);
        assert!(source.subscribe(tx.clone()).is_ok());
        assert!(matches!(source.subscribe(tx), Err(CloudError::AlreadySubscribed)));
    }
}
