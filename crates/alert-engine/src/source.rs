//! Snapshot source boundary

use data_validator::RawSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::hub::{HubError, MonitorHub};

/// A raw snapshot tagged with the feed it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub feed_id: String,
    pub snapshot: RawSnapshot,
}

/// Producer of feed snapshots
///
/// Sources may redeliver the same logical state any number of times and
/// in any order; the engine tolerates both.
pub trait SnapshotSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start pushing snapshots into `tx` until the source shuts down
    fn subscribe(&mut self, tx: mpsc::Sender<FeedSnapshot>) -> Result<(), Self::Error>;
}

/// Drain a snapshot channel into the hub until every sender is dropped
///
/// Returns the number of snapshots accepted.
pub async fn run_ingest_loop(mut rx: mpsc::Receiver<FeedSnapshot>, hub: Arc<MonitorHub>) -> u64 {
    let mut accepted = 0u64;

    while let Some(FeedSnapshot { feed_id, snapshot }) = rx.recv().await {
        match hub.ingest(&feed_id, &snapshot) {
            Ok(report) => {
                accepted += 1;
                debug!(feed = %feed_id, state = report.state.as_str(), "snapshot ingested");
            }
            // already logged by the engine
            Err(HubError::Validation(_)) => {}
            Err(e) => error!(feed = %feed_id, error = %e, "snapshot ingest failed"),
        }
    }

    info!("Snapshot channel closed after {} accepted snapshots", accepted);
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use alerting::TracingSink;
    use chrono::{Duration, TimeZone, Utc};
    use std::convert::Infallible;

    /// Source replaying a fixed list of snapshots
    struct ReplaySource {
        snapshots: Vec<FeedSnapshot>,
    }

    impl SnapshotSource for ReplaySource {
        type Error = Infallible;

        fn subscribe(&mut self, tx: mpsc::Sender<FeedSnapshot>) -> Result<(), Self::Error> {
            let snapshots = std::mem::take(&mut self.snapshots);
            tokio::spawn(async move {
                for snapshot in snapshots {
                    if tx.send(snapshot).await.is_err() {
                        break;
                    }
                }
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ingest_loop_drains_source() {
        let t0 = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        let feed = |offset_ms: i64, crying: bool| FeedSnapshot {
            feed_id: "nursery".to_string(),
            snapshot: RawSnapshot::reading(20.0, 50.0, crying, t0 + Duration::milliseconds(offset_ms)),
        };

        let mut source = ReplaySource {
            snapshots: vec![
                feed(0, true),
                FeedSnapshot {
                    feed_id: "nursery".to_string(),
                    snapshot: RawSnapshot::default(),
                },
                feed(1_000, true),
                feed(2_500, true),
            ],
        };

        let hub = Arc::new(MonitorHub::new(&EngineConfig::default(), Arc::new(TracingSink)).unwrap());
        let (tx, rx) = mpsc::channel(8);
        source.subscribe(tx).unwrap();

        let accepted = run_ingest_loop(rx, Arc::clone(&hub)).await;
        assert_eq!(accepted, 3);
        assert_eq!(hub.recent_alerts(10).unwrap().len(), 1);
    }
}
