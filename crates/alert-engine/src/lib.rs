//! Alert Transition Engine
//!
//! Consumes sensor snapshots per feed and emits at most one alert per
//! confirmed crying episode:
//! - Validation of raw feed documents
//! - Debounced transition detection
//! - Episode deduplication
//! - Hand-off to a notification sink

pub mod config;
pub mod directive;
pub mod engine;
pub mod hub;
pub mod source;

pub use config::{ConfigurationError, EngineConfig, EngineSettings, StaleSnapshotPolicy};
pub use directive::{AlertDirective, DisplayState};
pub use engine::AlertTransitionEngine;
pub use hub::{DeliveredAlert, DeliveryStatus, HubError, IngestReport, MonitorHub};
pub use source::{run_ingest_loop, FeedSnapshot, SnapshotSource};

pub use alerting::{DeliveryError, NotificationSink, TracingSink};
pub use data_validator::{RawSnapshot, Snapshot, ValidationError};
pub use cry_tracker::{MonitorState, TransitionEvent};
