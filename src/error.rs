//! Error types for talking to the device and managing local state.

/// Errors raised by the device gateway, the config store and the intent handlers.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// No device address configured. Nothing was sent over the wire.
    #[error("Base URL is empty")]
    Configuration,

    /// The device answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    DeviceRequestFailed {
        /// HTTP status code returned by the device.
        status: u16,
        /// Response text, or the status reason when the body could not be read.
        body: String,
    },

    /// IR command name with no entry in the NEC code table.
    #[error("Unknown IR command: {0}")]
    UnmappedCommand(String),

    /// Connection-level failure (DNS, refused, reset, ...).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A colour string that is not `#RRGGBB`.
    #[error("Invalid color {0:?} (expected #RRGGBB)")]
    InvalidColor(String),

    /// The config file could not be created or written.
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Short label used for the transient notification after a failed intent.
    pub fn toast_text(&self) -> &'static str {
        match self {
            RemoteError::Configuration => "Base URL is empty",
            RemoteError::UnmappedCommand(_) => "Unknown command",
            RemoteError::InvalidColor(_) => "Invalid color",
            _ => "Send failed",
        }
    }
}
