//! Notification delivery boundary

use thiserror::Error;
use tracing::info;

/// Errors reported by a notification sink
///
/// Always non-fatal for the caller: the alert stays claimed and no retry is
/// attempted here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Notification sink unavailable: {0}")]
    Unavailable(String),
}

/// Something that can show an alert to the user
///
/// Implementations must not block; queue the message and return.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Sink that only writes the alert to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, title: &str, body: &str) -> Result<(), DeliveryError> {
        info!(title, body, "notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_sink_accepts() {
        let sink: &dyn NotificationSink = &TracingSink;
        assert!(sink.notify("Baby alert", "Baby is crying!").is_ok());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DeliveryError::PermissionDenied.to_string(),
            "Notification permission denied"
        );
        assert_eq!(
            DeliveryError::Transport("broker gone".into()).to_string(),
            "Transport failed: broker gone"
        );
    }
}
