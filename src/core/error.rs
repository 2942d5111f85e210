//! Error taxonomy for the tracing client.

use thiserror::Error;

/// Errors surfaced by the Tracewire client.
///
/// Contract violations (`UnknownRequest`, `UnknownSpan`, `DoubleStop`) are
/// returned to the caller so integration bugs surface immediately. Delivery
/// failures never appear here; the transport absorbs them and counts the
/// dropped frames instead.
#[derive(Error, Debug)]
pub enum TracewireError {
    /// The request handle is not registered as active.
    #[error("unknown request: {0}")]
    UnknownRequest(String),

    /// The span handle does not refer to an open span.
    #[error("unknown span: {0}")]
    UnknownSpan(String),

    /// The span was already stopped once.
    #[error("span already stopped: {0}")]
    DoubleStop(String),

    /// An identifier failed validation.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The agent endpoint string could not be parsed.
    #[error("invalid agent endpoint: {0}")]
    Endpoint(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Command serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Tracewire operations.
pub type Result<T> = std::result::Result<T, TracewireError>;

impl TracewireError {
    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new endpoint error.
    pub fn endpoint<S: Into<String>>(msg: S) -> Self {
        Self::Endpoint(msg.into())
    }

    /// Returns true if this error indicates a bug in how instrumentation is
    /// wired into the application, as opposed to an environmental failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::UnknownRequest(_) | Self::UnknownSpan(_) | Self::DoubleStop(_)
        )
    }

    /// Returns the error category for metrics/logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownRequest(_) | Self::UnknownSpan(_) | Self::DoubleStop(_) => "contract",
            Self::InvalidId(_) => "validation",
            Self::Config(_) | Self::Endpoint(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
