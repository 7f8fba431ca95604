//! Snapshot Validator for Presence and Range Checking

use crate::error::ValidationError;
use crate::snapshot::{RawSnapshot, Snapshot};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Temperature valid range (°C)
    pub temperature_range: (f64, f64),
    /// Relative humidity valid range (%)
    pub humidity_range: (f64, f64),
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            temperature_range: (-20.0, 60.0),
            humidity_range: (0.0, 100.0),
        }
    }
}

/// Validator turning raw feed documents into snapshots
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a raw document, producing a snapshot on success
    ///
    /// Presence is checked before ranges so a document missing several
    /// fields reports the first missing one.
    pub fn validate(&self, raw: &RawSnapshot) -> Result<Snapshot, ValidationError> {
        let temperature = raw
            .temperature()
            .ok_or(ValidationError::MissingField("environment.temperature"))?;
        let humidity = raw
            .humidity()
            .ok_or(ValidationError::MissingField("environment.humidity"))?;
        let is_crying = raw
            .is_crying()
            .ok_or(ValidationError::MissingField("babyStatus.isCrying"))?;
        let observed_at = raw
            .observed_at
            .ok_or(ValidationError::MissingField("observedAt"))?;

        self.validate_temperature(temperature)?;
        self.validate_humidity(humidity)?;

        debug!(temperature, humidity, is_crying, %observed_at, "snapshot validated");

        Ok(Snapshot {
            temperature,
            humidity,
            is_crying,
            observed_at,
            sequence: raw.sequence,
        })
    }

    /// Validate a single value against a range
    pub fn validate_range(
        &self,
        field: &'static str,
        value: f64,
        range: (f64, f64),
    ) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NotFinite { field, value });
        }
        if value < range.0 || value > range.1 {
            Err(ValidationError::OutOfRange {
                field,
                value,
                min: range.0,
                max: range.1,
            })
        } else {
            Ok(())
        }
    }

    /// Validate temperature
    pub fn validate_temperature(&self, temp: f64) -> Result<(), ValidationError> {
        self.validate_range("temperature", temp, self.config.temperature_range)
    }

    /// Validate humidity
    pub fn validate_humidity(&self, humidity: f64) -> Result<(), ValidationError> {
        self.validate_range("humidity", humidity, self.config.humidity_range)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
