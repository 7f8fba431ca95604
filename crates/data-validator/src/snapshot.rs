//! Snapshot Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// A validated sensor snapshot
///
/// Immutable once produced; the engine only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Room temperature (°C)
    pub temperature: f64,
    /// Relative humidity (%)
    pub humidity: f64,
    /// Raw crying flag reported by the sensor
    pub is_crying: bool,
    /// When the sensor took the reading
    pub observed_at: DateTime<Utc>,
    /// Optional monotonic id assigned by the feed
    pub sequence: Option<u64>,
}

/// Environment subtree of the feed document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// Baby status subtree of the feed document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BabyStatus {
    pub is_crying: Option<bool>,
}

/// Snapshot document as delivered by a feed
///
/// Every field may be absent on the wire:
///
/// ```json
/// {
///   "environment": { "temperature": 23.5, "humidity": 41.0 },
///   "babyStatus": { "isCrying": true },
///   "observedAt": "2026-01-01T12:00:00Z",
///   "sequence": 17
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSnapshot {
    pub environment: Option<Environment>,
    pub baby_status: Option<BabyStatus>,
    pub observed_at: Option<DateTime<Utc>>,
    pub sequence: Option<u64>,
}

impl RawSnapshot {
    /// Build a complete document from individual readings
    pub fn reading(
        temperature: f64,
        humidity: f64,
        is_crying: bool,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            environment: Some(Environment {
                temperature: Some(temperature),
                humidity: Some(humidity),
            }),
            baby_status: Some(BabyStatus {
                is_crying: Some(is_crying),
            }),
            observed_at: Some(observed_at),
            sequence: None,
        }
    }

    /// Attach a feed sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Decode a JSON feed document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.environment.as_ref().and_then(|e| e.temperature)
    }

    pub fn humidity(&self) -> Option<f64> {
        self.environment.as_ref().and_then(|e| e.humidity)
    }

    pub fn is_crying(&self) -> Option<bool> {
        self.baby_status.as_ref().and_then(|s| s.is_crying)
    }
}

impl From<&Snapshot> for RawSnapshot {
    fn from(snapshot: &Snapshot) -> Self {
        let raw = Self::reading(
            snapshot.temperature,
            snapshot.humidity,
            snapshot.is_crying,
            snapshot.observed_at,
        );
        Self {
            sequence: snapshot.sequence,
            ..raw
        }
    }
}
