//! Per-feed engine registry and alert delivery

use alerting::NotificationSink;
use chrono::{DateTime, Utc};
use cry_tracker::MonitorState;
use data_validator::{RawSnapshot, ValidationError, Validator};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigurationError, EngineConfig, EngineSettings};
use crate::directive::{AlertDirective, DisplayState};
use crate::engine::AlertTransitionEngine;

/// Hub error types
#[derive(Error, Debug)]
pub enum HubError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Lock error: {0}")]
    LockPoisoned(String),
}

/// Outcome of handing a directive to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DeliveryStatus {
    NotAttempted,
    Delivered,
    Failed(String),
}

/// Alert directive together with its delivery outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveredAlert {
    pub directive: AlertDirective,
    pub delivery: DeliveryStatus,
}

/// Result of ingesting one snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub feed_id: String,
    pub state: MonitorState,
    pub directive: Option<AlertDirective>,
    pub delivery: DeliveryStatus,
}

/// Registry of independent per-feed engines
///
/// Each feed has its own engine behind its own lock, so ingests for one
/// feed are serialized while different feeds never contend. A feed is only
/// registered by a valid snapshot, at most `max_feeds` are kept, and feeds
/// that stop reporting are dropped by [`evict_idle`](Self::evict_idle).
pub struct MonitorHub {
    settings: EngineSettings,
    validator: Validator,
    engines: RwLock<HashMap<String, Arc<Mutex<AlertTransitionEngine>>>>,
    sink: Arc<dyn NotificationSink>,
    recent_alerts: Mutex<VecDeque<DeliveredAlert>>,
    max_recent_alerts: usize,
}

impl MonitorHub {
    /// Create a new hub, validating the engine configuration once
    pub fn new(config: &EngineConfig, sink: Arc<dyn NotificationSink>) -> Result<Self, ConfigurationError> {
        let settings = config.validate()?;
        info!("Creating monitor hub");
        Ok(Self {
            validator: Validator::new(settings.validation.clone()),
            settings,
            engines: RwLock::new(HashMap::new()),
            sink,
            recent_alerts: Mutex::new(VecDeque::with_capacity(64)),
            max_recent_alerts: 256,
        })
    }

    /// Ingest a snapshot for a feed and deliver any resulting alert
    ///
    /// A delivery failure is logged and reported but never rolls back the
    /// alert claim.
    pub fn ingest(&self, feed_id: &str, raw: &RawSnapshot) -> Result<IngestReport, HubError> {
        let engine = match self.existing_engine(feed_id)? {
            Some(engine) => engine,
            None => {
                if let Err(e) = self.validator.validate(raw) {
                    warn!(feed = %feed_id, error = %e, "snapshot for unknown feed rejected");
                    counter!("monitor_unknown_feed_rejections_total").increment(1);
                    return Err(e.into());
                }
                self.register(feed_id)?
            }
        };

        let (directive, state) = {
            let mut engine = engine
                .lock()
                .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
            let directive = engine.ingest(raw)?;
            (directive, engine.monitor_state())
        };

        let delivery = match &directive {
            Some(directive) => self.deliver(directive)?,
            None => DeliveryStatus::NotAttempted,
        };

        Ok(IngestReport {
            feed_id: feed_id.to_string(),
            state,
            directive,
            delivery,
        })
    }

    fn deliver(&self, directive: &AlertDirective) -> Result<DeliveryStatus, HubError> {
        let delivery = match self.sink.notify(&directive.title, &directive.body) {
            Ok(()) => {
                debug!(feed = %directive.feed_id, alert_id = %directive.alert_id, "alert delivered");
                DeliveryStatus::Delivered
            }
            Err(e) => {
                error!(
                    feed = %directive.feed_id,
                    alert_id = %directive.alert_id,
                    error = %e,
                    "alert delivery failed"
                );
                counter!(
                    "monitor_alert_delivery_failures_total",
                    "feed" => directive.feed_id.clone()
                )
                .increment(1);
                DeliveryStatus::Failed(e.to_string())
            }
        };

        let mut recent = self
            .recent_alerts
            .lock()
            .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
        while recent.len() >= self.max_recent_alerts {
            recent.pop_front();
        }
        recent.push_back(DeliveredAlert {
            directive: directive.clone(),
            delivery: delivery.clone(),
        });

        Ok(delivery)
    }

    fn existing_engine(
        &self,
        feed_id: &str,
    ) -> Result<Option<Arc<Mutex<AlertTransitionEngine>>>, HubError> {
        let engines = self
            .engines
            .read()
            .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
        Ok(engines.get(feed_id).map(Arc::clone))
    }

    fn register(&self, feed_id: &str) -> Result<Arc<Mutex<AlertTransitionEngine>>, HubError> {
        let mut engines = self
            .engines
            .write()
            .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
        if let Some(engine) = engines.get(feed_id) {
            return Ok(Arc::clone(engine));
        }

        if engines.len() >= self.settings.max_feeds {
            let mut oldest: Option<(Option<DateTime<Utc>>, &String)> = None;
            for (id, engine) in engines.iter() {
                let observed_at = last_observed(engine)?;
                if oldest.map_or(true, |(at, _)| observed_at < at) {
                    oldest = Some((observed_at, id));
                }
            }
            if let Some(id) = oldest.map(|(_, id)| id.clone()) {
                engines.remove(&id);
                info!(feed = %id, "feed limit reached, dropped least recently observed feed");
            }
        }

        let engine = Arc::new(Mutex::new(AlertTransitionEngine::with_settings(
            feed_id,
            self.settings.clone(),
        )));
        engines.insert(feed_id.to_string(), Arc::clone(&engine));
        Ok(engine)
    }

    /// Drop feeds whose newest snapshot is older than the idle timeout
    ///
    /// Returns the number of feeds dropped.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> Result<usize, HubError> {
        let Some(cutoff) = now.checked_sub_signed(self.settings.feed_idle_timeout) else {
            return Ok(0);
        };

        let mut engines = self
            .engines
            .write()
            .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
        let mut idle = Vec::new();
        for (id, engine) in engines.iter() {
            if last_observed(engine)?.map_or(true, |at| at < cutoff) {
                idle.push(id.clone());
            }
        }

        for id in &idle {
            engines.remove(id);
            info!(feed = %id, "idle feed dropped");
        }
        Ok(idle.len())
    }

    /// Display state of a feed, if it has been seen
    pub fn display(&self, feed_id: &str) -> Result<Option<DisplayState>, HubError> {
        let engines = self
            .engines
            .read()
            .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
        match engines.get(feed_id) {
            Some(engine) => {
                let engine = engine
                    .lock()
                    .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
                Ok(Some(engine.display().clone()))
            }
            None => Ok(None),
        }
    }

    /// Reset a feed's tracker ahead of a replay; returns false for unknown feeds
    pub fn reset_feed(&self, feed_id: &str) -> Result<bool, HubError> {
        let engines = self
            .engines
            .read()
            .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
        match engines.get(feed_id) {
            Some(engine) => {
                engine
                    .lock()
                    .map_err(|e| HubError::LockPoisoned(e.to_string()))?
                    .reset_tracker();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Known feed ids, sorted
    pub fn feeds(&self) -> Result<Vec<String>, HubError> {
        let engines = self
            .engines
            .read()
            .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
        let mut feeds: Vec<String> = engines.keys().cloned().collect();
        feeds.sort();
        Ok(feeds)
    }

    /// Most recent alerts, newest first
    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<DeliveredAlert>, HubError> {
        let recent = self
            .recent_alerts
            .lock()
            .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
        Ok(recent.iter().rev().take(limit).cloned().collect())
    }
}

fn last_observed(
    engine: &Mutex<AlertTransitionEngine>,
) -> Result<Option<DateTime<Utc>>, HubError> {
    let engine = engine
        .lock()
        .map_err(|e| HubError::LockPoisoned(e.to_string()))?;
    Ok(engine.display().observed_at)
}
