// ── Bridge error types ──

use carrot_core::CoreError;
use thiserror::Error;

/// Errors from publishing to the bus or forwarding commands to the cloud.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("MQTT request failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("MQTT transport setup failed: {message}")]
    Transport { message: String },

    #[error("Payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Raised by non-MQTT bus implementations.
    #[error("Bus error: {0}")]
    Bus(String),
}
