//! Error types for Drishti

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Drishti error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error (settings sidecar, settings payloads)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown device type in configuration
    #[error("Unknown device type: {0}")]
    UnknownDevice(String),

    /// Hardware not connected (controller board or camera)
    #[error("Hardware not connected: {0}")]
    NotConnected(&'static str),

    /// Hardware command or acquisition failed
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Image processing failed for a frame
    #[error("Processing error: {0}")]
    Processing(String),

    /// Scan settings cannot produce a valid scan
    #[error("Invalid scan settings: {0}")]
    InvalidSettings(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Channel closed (orchestrator or worker gone)
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    /// No reply arrived in time
    #[error("Communication timeout")]
    Timeout,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
