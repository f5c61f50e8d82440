use thiserror::Error;

/// Crate error types.
///
/// Every variant carries owned data only, so errors stay `Clone` and a
/// single failure can be handed to every caller waiting on the same
/// coalesced request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Token acquisition or connection upgrade rejected
    #[error("Authentication failed (status {status}): {message}")]
    Auth { status: u16, message: String },

    /// Connection-level failures (dial, read, write, close)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error reported by the search backend for a request
    #[error("Backend error: {0}")]
    Backend(String),

    /// No response within the configured window
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A capability was invoked without its configuration block
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl Error {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            Error::Auth { .. } => "AUTH_FAILED",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Backend(_) => "BACKEND_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::NotConfigured(_) => "NOT_CONFIGURED",
        }
    }

    /// Whether retrying the same request can reasonably succeed.
    ///
    /// Auth rejections and configuration problems are not retryable; the
    /// channel treats them as terminal until reconfigured.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
