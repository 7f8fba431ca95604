//! Snapshot Validation
//!
//! Provides the sensor snapshot model, the raw feed document it is decoded
//! from, and field presence/range checking between the two.

mod error;
mod snapshot;
mod validator;

pub use error::ValidationError;
pub use snapshot::{BabyStatus, Environment, RawSnapshot, Snapshot};
pub use validator::{ValidationConfig, Validator};
