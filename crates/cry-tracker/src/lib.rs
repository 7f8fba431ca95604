//! Cry State Tracking
//!
//! Converts the raw, noisy `isCrying` flag of a snapshot stream into
//! confirmed transitions:
//! - Debounce: a new value must hold for the configured threshold
//! - Flap rejection: reverting before the threshold discards the window
//! - Stale suppression: snapshots older than the last confirmation are ignored

pub mod state;
pub mod tracker;

pub use state::{MonitorState, TrackerState, TransitionEvent};
pub use tracker::DebouncedStateTracker;
