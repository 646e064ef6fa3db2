use thiserror::Error;

/// Result type for amplifier operations
pub type Result<T> = std::result::Result<T, BreatheError>;

/// Errors that can occur when talking to a BreatheAudio amplifier
#[derive(Error, Debug)]
pub enum BreatheError {
    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error on the serial link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Background link tasks have stopped
    #[error("Connection closed")]
    ConnectionClosed,

    /// No byte arrived within the timeout window
    #[error("Connection timed out! Last received bytes {}", hex_bytes(.received))]
    Timeout {
        /// Bytes accumulated before the timeout fired
        received: Vec<u8>,
    },

    /// Zone id outside 1..6
    #[error("Invalid zone: {0} (expected 1..6)")]
    InvalidZone(u8),

    /// Configuration could not be used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON configuration could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BreatheError {
    /// Whether this error means the amplifier is unreachable.
    ///
    /// Callers use this to treat a failing startup probe as "not ready".
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Serial(_) | Self::Io(_) | Self::ConnectionClosed | Self::Timeout { .. }
        )
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    let parts: Vec<String> = bytes.iter().map(|b| format!("{:#04x}", b)).collect();
    format!("[{}]", parts.join(", "))
}
